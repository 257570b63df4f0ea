pub mod connection;
pub mod mmr;
pub mod retrieval;
pub mod storage;
