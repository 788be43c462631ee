use std::io::{self, BufRead, Write};

use crate::common;
use crate::common::format::{self, FormatDescriptor};

fn read_answer<R : BufRead>(input : &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        // end of input, nobody is there to answer
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

/// Lists the ranked formats and asks for one by its 1-based index. An empty
/// answer takes the first (best) entry. Invalid answers are asked again
/// until the user gives a valid one, types `q`, or input runs out; the
/// latter two return `None`.
pub fn choose<'a, R : BufRead, W : Write>(
    ranked : &[&'a FormatDescriptor],
    duration : Option<f64>,
    input : &mut R,
    output : &mut W,
) -> common::Result<Option<&'a FormatDescriptor>> {
    if ranked.is_empty() {
        return Err(Box::new(common::Error::NoSuitableFormats));
    }
    writeln!(output, "\nAvailable formats:")?;
    for (i, format) in ranked.iter().enumerate() {
        writeln!(output, "{}", format::describe(i + 1, format, duration))?;
    }
    loop {
        write!(output, "\nSelect quality [1-{}] (Enter for best, q to cancel): ", ranked.len())?;
        output.flush()?;
        let Some(answer) = read_answer(input)? else {
            return Ok(None);
        };
        if answer.is_empty() {
            return Ok(Some(ranked[0]));
        }
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= ranked.len() => return Ok(Some(ranked[n - 1])),
            _ => writeln!(output, "invalid choice '{}', enter a number between 1 and {}", answer, ranked.len())?,
        }
    }
}

/// Asks a yes/no question, anything other than `y` or `yes` counts as no.
pub fn confirm<R : BufRead, W : Write>(
    question : &str,
    input : &mut R,
    output : &mut W,
) -> io::Result<bool> {
    write!(output, "{} (y/N): ", question)?;
    output.flush()?;
    let answer = read_answer(input)?.unwrap_or_default().to_lowercase();
    Ok(matches!(answer.as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn formats() -> Vec<FormatDescriptor> {
        [2160, 1080, 720].iter().map(|height| FormatDescriptor {
            format_id : format!("f{}", height),
            height : Some(*height),
            ext : "mp4".to_owned(),
            ..Default::default()
        }).collect()
    }

    fn pick(answers : &str) -> (Option<String>, String) {
        let formats = formats();
        let ranked = format::rank(&formats);
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let chosen = choose(&ranked, None, &mut input, &mut output).unwrap();
        (chosen.map(|x| x.format_id.clone()), String::from_utf8(output).unwrap())
    }

    #[test]
    fn empty_answer_takes_best() {
        let (chosen, output) = pick("\n");
        assert_eq!(chosen.as_deref(), Some("f2160"));
        assert!(output.contains("1. 2160p | Unknown | Unknown | N/A | mp4"));
    }

    #[test]
    fn picks_by_index() {
        let (chosen, _) = pick("3\n");
        assert_eq!(chosen.as_deref(), Some("f720"));
    }

    #[test]
    fn reprompts_on_bad_input() {
        let (chosen, output) = pick("0\nfour\n9\n2\n");
        assert_eq!(chosen.as_deref(), Some("f1080"));
        assert_eq!(output.matches("invalid choice").count(), 3);
    }

    #[test]
    fn end_of_input_cancels() {
        let (chosen, _) = pick("abc\n");
        assert_eq!(chosen, None);
        let (chosen, _) = pick("q\n");
        assert_eq!(chosen, None);
    }

    #[test]
    fn empty_list_is_an_error() {
        let mut input = Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        let ranked : Vec<&FormatDescriptor> = Vec::new();
        assert!(choose(&ranked, None, &mut input, &mut output).is_err());
    }

    #[test]
    fn confirm_accepts_only_yes() {
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("\n", false), ("n\n", false), ("", false)] {
            let mut input = Cursor::new(answer.as_bytes().to_vec());
            let mut output = Vec::new();
            assert_eq!(confirm("download?", &mut input, &mut output).unwrap(), expected, "{:?}", answer);
        }
    }
}
