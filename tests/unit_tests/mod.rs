mod cache;
mod element;
mod format;
mod fragment;
mod signature;
