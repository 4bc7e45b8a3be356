use std::path::{Path, PathBuf};

fn extension(compress: bool) -> &'static str {
    if compress {
        ".json.gz"
    } else {
        ".json"
    }
}

/// `<output_dir>/<db>_<NN>.json[.gz]`.
pub fn output_file_name(db: &str, output_dir: &Path, index: u32, compress: bool) -> PathBuf {
    output_dir.join(format!("{db}_{index:02}{}", extension(compress)))
}

/// Rotation index encoded in `file_name`, if it is an output of `db`.
pub fn parse_output_index(file_name: &str, db: &str, compress: bool) -> Option<u32> {
    let digits = file_name
        .strip_prefix(db)?
        .strip_prefix('_')?
        .strip_suffix(extension(compress))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Highest rotation index already present for `db` in `output_dir`, or 0.
pub fn highest_index(output_dir: &Path, db: &str, compress: bool) -> std::io::Result<u32> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut highest = 0;
    for entry in entries {
        let entry = entry?;
        if let Some(index) = entry
            .file_name()
            .to_str()
            .and_then(|name| parse_output_index(name, db, compress))
        {
            highest = highest.max(index);
        }
    }
    Ok(highest)
}
