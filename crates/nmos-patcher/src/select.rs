//! Numbered-list prompts for picking a sender or receiver.

use std::io::{self, BufRead, Write};

/// Print `items` as a 1-based list and read a choice from `input`.
///
/// Re-prompts on non-numeric or out-of-range answers. Returns the 0-based
/// index, or `UnexpectedEof` if input ends first.
pub fn select_from_list<R: BufRead, W: Write>(
    items: &[String],
    prompt: &str,
    mut input: R,
    mut output: W,
) -> io::Result<usize> {
    if items.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("nothing to choose from: {prompt}"),
        ));
    }

    writeln!(output, "\n{prompt}")?;
    for (idx, item) in items.iter().enumerate() {
        writeln!(output, "{}: {item}", idx + 1)?;
    }

    let mut line = String::new();
    loop {
        write!(output, "\nPlease enter number: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before a selection was made",
            ));
        }

        match line.trim().parse::<usize>() {
            Ok(choice) if (1..=items.len()).contains(&choice) => return Ok(choice - 1),
            Ok(_) => writeln!(output, "Out of range number.")?,
            Err(_) => writeln!(output, "Please enter a number.")?,
        }
    }
}

/// Index of the entry whose id equals `wanted`.
pub fn select_by_id<T>(items: &[T], wanted: &str, id: impl Fn(&T) -> &str) -> Option<usize> {
    items.iter().position(|item| id(item) == wanted)
}
