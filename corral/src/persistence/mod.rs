mod postgres;

pub use postgres::{connect, PostgresResourcePool, PostgresRunLedger};
