/// Splits running text into complete sentences.
///
/// Resolved once at session setup; sentence-based buffer trimming is the
/// only consumer. Language-specific model-backed splitters plug in here.
pub trait SentenceSplitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

/// Rule-based splitter: a sentence ends at terminal punctuation followed by
/// whitespace (or end of text), with trailing quotes and brackets kept on
/// the sentence they close.
///
/// Deliberately naive about abbreviations; transcribed speech rarely
/// contains them and a wrong split only shifts a trim point.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSplitter;

const TERMINALS: [char; 4] = ['.', '!', '?', '…'];
const CLOSERS: [char; 7] = ['"', '\'', ')', ']', '»', '”', '’'];

impl SentenceSplitter for RuleSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            if !TERMINALS.contains(&c) {
                continue;
            }
            while let Some(&next) = chars.peek() {
                if CLOSERS.contains(&next) {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            match chars.peek() {
                None => {}
                Some(&next) if next.is_whitespace() => {}
                // mid-token punctuation ("3.14", "example.com")
                _ => continue,
            }
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }

        let tail = current.trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }
        sentences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        RuleSplitter.split(text)
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        assert_eq!(
            split("Hello there. How are you? Fine!"),
            vec!["Hello there.", "How are you?", "Fine!"]
        );
    }

    #[test]
    fn keeps_incomplete_tail() {
        assert_eq!(
            split("First sentence. and then some trailing words"),
            vec!["First sentence.", "and then some trailing words"]
        );
    }

    #[test]
    fn does_not_split_inside_numbers() {
        assert_eq!(split("Pi is 3.14 roughly."), vec!["Pi is 3.14 roughly."]);
    }

    #[test]
    fn attaches_closing_quotes() {
        assert_eq!(
            split("He said \"stop.\" Then he left."),
            vec!["He said \"stop.\"", "Then he left."]
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split("").is_empty());
        assert!(split("   ").is_empty());
    }
}
