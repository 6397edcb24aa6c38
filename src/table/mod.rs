pub mod loader;
pub mod record;
pub mod writer;

pub use loader::{load_csv, read_csv, DEFAULT_INPUT};
pub use record::{
    AthleteRecord, PopulationTable, Value, HEIGHT_COLUMN, PEAK_YEAR_COLUMN, PLAYER_COLUMN,
};
pub use writer::{save_csv, write_csv};
