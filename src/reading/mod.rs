pub mod daily;
pub mod monthly;

pub use daily::{read_chunk_file, ChunkRow, DailyRow};
pub use monthly::{aggregate_monthly, MonthlyTotal};
