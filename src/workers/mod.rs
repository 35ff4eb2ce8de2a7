pub mod cleanup;

pub use cleanup::spawn_cleanup_worker;
