use std::{io::ErrorKind, path::Path};

use anyhow::Context;

pub fn read(path: &Path) -> anyhow::Result<toml::Table> {
    // Fails if the file exists but cannot be read or parsed. Missing file just
    // returns an empty table.

    let path_str = path.display();

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => "".to_owned(),
        Err(err) => {
            return Err(err).context(format!("Failed to read toml file {}.", path_str));
        }
    };

    toml::from_str::<toml::Table>(&contents)
        .context(format!("Failed to parse toml in file {}.", path_str))
}
