//! Fixed-width text report of a comparison.

use std::io::{self, Write};
use std::path::PathBuf;

/// Width of the field-name column.
const FIELD_WIDTH: usize = 11;
/// Width of each per-file value column.
const VALUE_WIDTH: usize = 45;

/// Write the comparison report: a header row with the file paths, one row
/// per differing field, and a final DATA line.
///
/// Every token is left-justified and space-padded to its column width. A
/// file that contributed no entry for a field (higher-dimensional value)
/// simply has no column, shifting the ones after it.
pub fn write_report<W: Write>(
    out: &mut W,
    files: &[PathBuf],
    header_diff: &[(String, Vec<String>)],
    data_differs: bool,
) -> io::Result<()> {
    write!(out, "{:<FIELD_WIDTH$}", "Field")?;
    for file in files {
        write!(out, "{:<VALUE_WIDTH$}", file.display())?;
    }
    writeln!(out)?;

    for (field, entries) in header_diff {
        write!(out, "{field:<FIELD_WIDTH$}")?;
        for entry in entries {
            write!(out, "{entry:<VALUE_WIDTH$}")?;
        }
        writeln!(out)?;
    }

    write!(out, "DATA: ")?;
    if data_differs {
        writeln!(out, "These files are different.")?;
    } else {
        writeln!(out, "These files are identical!")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(
        files: &[&str],
        header_diff: &[(String, Vec<String>)],
        data_differs: bool,
    ) -> String {
        let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
        let mut out = Vec::new();
        write_report(&mut out, &files, header_diff, data_differs).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_column_widths() {
        let diff = vec![(
            "descrip".to_string(),
            vec!["abc".to_string(), "xyz".to_string()],
        )];
        let output = render(&["a.nii", "b.nii"], &diff, false);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);

        // Header row: 11-column field label, 45-column file paths.
        assert_eq!(&lines[0][..11], "Field      ");
        assert_eq!(lines[0].len(), 11 + 45 + 45);
        assert_eq!(&lines[0][11..56], format!("{:<45}", "a.nii"));
        assert_eq!(&lines[0][56..], format!("{:<45}", "b.nii"));

        // Field row: same layout.
        assert_eq!(&lines[1][..11], "descrip    ");
        assert_eq!(&lines[1][11..56], format!("{:<45}", "abc"));
        assert_eq!(&lines[1][56..], format!("{:<45}", "xyz"));
    }

    #[test]
    fn test_data_line_identical() {
        let output = render(&["a.nii", "b.nii"], &[], false);
        assert!(output.ends_with("DATA: These files are identical!\n"));
    }

    #[test]
    fn test_data_line_different() {
        let output = render(&["a.nii", "b.nii"], &[], true);
        assert!(output.ends_with("DATA: These files are different.\n"));
    }

    #[test]
    fn test_no_differing_fields_gives_header_and_data_only() {
        let output = render(&["a.nii", "b.nii"], &[], false);
        assert_eq!(output.lines().count(), 2);
    }
}
