use std::io::BufRead;
use std::path::Path;

use crate::input::InputError;
use crate::input::reader::open_maybe_gz;

/// One cell identifier per non-empty line; only the first tab-separated field is used.
pub fn parse_barcodes(path: &Path) -> Result<Vec<String>, InputError> {
    let mut reader = open_maybe_gz(path)?;
    let mut buf = String::new();
    let mut barcodes = Vec::new();

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let field = buf.split('\t').next().unwrap_or_default().trim();
        if field.is_empty() {
            continue;
        }
        barcodes.push(field.to_string());
    }

    if barcodes.is_empty() {
        return Err(InputError::Parse(format!("{} is empty", path.display())));
    }
    Ok(barcodes)
}
