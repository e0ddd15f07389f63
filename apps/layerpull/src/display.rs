//! Output rendering

use layerpull_types::VerifiedBlobFile;
use std::io::{self, Write};

/// Renders the verified blobs of a finished pull on stdout
#[derive(Clone, Copy)]
pub struct OutputRenderer {
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// One path per line, or a JSON array of `{path, digest, size}`
    pub fn render_result(&self, files: &[VerifiedBlobFile]) -> io::Result<()> {
        let stdout = io::stdout();
        self.write_result(&mut stdout.lock(), files)
    }

    fn write_result(&self, out: &mut impl Write, files: &[VerifiedBlobFile]) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(files).map_err(io::Error::other)?;
            writeln!(out, "{json}")
        } else {
            for file in files {
                writeln!(out, "{}", file.path.display())?;
            }
            Ok(())
        }
    }
}
