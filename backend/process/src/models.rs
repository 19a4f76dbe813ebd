use food_server::record::Record;
use serde::Deserialize;

/// A dump of foods, either a bare list or wrapped the way `/foods` answers.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum Dump {
    List(Vec<Record>),
    Wrapped { items: Vec<Record> },
}

impl Dump {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Dump::List(records) => records,
            Dump::Wrapped { items } => items,
        }
    }
}
