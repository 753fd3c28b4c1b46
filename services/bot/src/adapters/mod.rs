pub mod db;
pub mod dictionary;

pub use db::PgJournalRepository;
pub use dictionary::HttpDictionaryAdapter;
