pub mod ai;
pub mod generation;
pub mod pdf;
pub mod storage;
