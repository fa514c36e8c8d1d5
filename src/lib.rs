//! Data layer for browsing the Open Library catalog and keeping a personal
//! reading record: favorites, a read-list with ratings and notes, search
//! and subject caches, infinite-scroll pagination and navigation memory.

pub mod app;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod collections;
pub mod config;
pub mod navigation;
pub mod pager;
pub mod storage;
pub mod suggest;
pub mod views;

pub use app::{App, CategoryRow};
pub use config::Config;
pub use pager::{PagerStatus, SearchPager};
