// src/lib.rs

pub mod config;

pub mod entities {
    pub mod prelude;
    pub mod last_rebase;
    pub mod rebase_history;
}

pub mod models {
    pub mod rebase_history;
}

pub mod services {
    pub mod chain_client;
    pub mod fixed_point;
    pub mod last_rebase_store;
    pub mod memory_store;
    pub mod quote_provider;
    pub mod rebase_history_store;
}

pub mod jobs {
    pub mod confirmation;
    pub mod rebase_cycle;
}
