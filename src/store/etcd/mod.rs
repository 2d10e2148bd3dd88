mod etcd_store;
pub use etcd_store::*;
