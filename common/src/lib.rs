pub mod addr;
pub mod apps;
pub mod client;
pub mod engine;
pub mod indexer;
pub mod job;
pub mod kv;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use addr::coordinator_sock;
pub use apps::{app_by_name, MapReduceApp};
pub use client::CoordinatorClient;
pub use indexer::Indexer;
pub use job::{DoneResponse, JobStatus, Phase};
pub use kv::{ihash, partition_for, KeyValue};
pub use task::TaskDescriptor;
pub use wordcount::WordCount;
pub use worker::{TaskRequest, WorkerId};
