use std::io::Read;

use super::SourceError;

/// Read the authoritative allow-list of site names (single `name` column).
///
/// Directory records whose key is absent from this list are excluded from
/// matching and reported separately, never silently dropped.
pub fn read_authoritative_list<R: Read>(reader: R) -> Result<Vec<String>, SourceError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let name_col = headers
        .iter()
        .position(|h| h == "name")
        .ok_or(SourceError::MissingColumn("name"))?;

    let mut names = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if let Some(name) = record.get(name_col).map(str::trim).filter(|s| !s.is_empty()) {
            names.push(name.to_string());
        }
    }

    Ok(names)
}
