//! Language and voice-command catalog.
//!
//! Static tables mapping each supported [`Language`] to its speech locale
//! and to the localized command words a user may type or say instead of
//! answering a question (`next`, `back`, `submit`, `repeat`).
//!
//! Languages are an enum rather than free-form names, so an unknown
//! language is rejected when it is parsed and can never reach the flow.
//!
//! ```rust
//! use cyberguard_core::catalog::{match_command, Command, Language};
//!
//! let hindi: Language = "hindi".parse().unwrap();
//! assert_eq!(hindi.locale(), "hi-IN");
//! assert_eq!(match_command(hindi, "  अगला "), Some(Command::Next));
//! assert_eq!(match_command(hindi, "NEXT"), Some(Command::Next));
//! assert_eq!(match_command(hindi, "next week"), None);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Language used for storage, categorization and oracle prompts.
pub const CANONICAL_LANGUAGE: Language = Language::English;

/// Returned when a language name or locale is not in the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown language: '{0}'")]
pub struct CatalogError(pub String);

/// A language the portal can converse in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Language {
    Hindi,
    Konkani,
    Kannada,
    Dogri,
    Bodo,
    Urdu,
    Tamil,
    Kashmiri,
    Assamese,
    Bengali,
    Marathi,
    Sindhi,
    Maithili,
    Punjabi,
    Malayalam,
    Manipuri,
    Telugu,
    Sanskrit,
    Nepali,
    Santali,
    Gujarati,
    Odia,
    English,
}

/// Localized words for the four flow commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSet {
    pub next: &'static str,
    pub back: &'static str,
    pub submit: &'static str,
    pub repeat: &'static str,
}

const ENGLISH_COMMANDS: CommandSet = CommandSet {
    next: "next",
    back: "back",
    submit: "submit",
    repeat: "repeat",
};

/// A navigation command recognized in place of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Next,
    Back,
    Submit,
    Repeat,
}

impl Command {
    /// The canonical English keyword, which is accepted in every language.
    pub fn keyword(self) -> &'static str {
        match self {
            Command::Next => ENGLISH_COMMANDS.next,
            Command::Back => ENGLISH_COMMANDS.back,
            Command::Submit => ENGLISH_COMMANDS.submit,
            Command::Repeat => ENGLISH_COMMANDS.repeat,
        }
    }
}

impl Language {
    /// Every supported language, in display order.
    pub const ALL: [Language; 23] = [
        Language::Hindi,
        Language::Konkani,
        Language::Kannada,
        Language::Dogri,
        Language::Bodo,
        Language::Urdu,
        Language::Tamil,
        Language::Kashmiri,
        Language::Assamese,
        Language::Bengali,
        Language::Marathi,
        Language::Sindhi,
        Language::Maithili,
        Language::Punjabi,
        Language::Malayalam,
        Language::Manipuri,
        Language::Telugu,
        Language::Sanskrit,
        Language::Nepali,
        Language::Santali,
        Language::Gujarati,
        Language::Odia,
        Language::English,
    ];

    /// Display name, also used as the language name in translation prompts.
    pub fn name(self) -> &'static str {
        match self {
            Language::Hindi => "Hindi",
            Language::Konkani => "Konkani",
            Language::Kannada => "Kannada",
            Language::Dogri => "Dogri",
            Language::Bodo => "Bodo",
            Language::Urdu => "Urdu",
            Language::Tamil => "Tamil",
            Language::Kashmiri => "Kashmiri",
            Language::Assamese => "Assamese",
            Language::Bengali => "Bengali",
            Language::Marathi => "Marathi",
            Language::Sindhi => "Sindhi",
            Language::Maithili => "Maithili",
            Language::Punjabi => "Punjabi",
            Language::Malayalam => "Malayalam",
            Language::Manipuri => "Manipuri",
            Language::Telugu => "Telugu",
            Language::Sanskrit => "Sanskrit",
            Language::Nepali => "Nepali",
            Language::Santali => "Santali",
            Language::Gujarati => "Gujarati",
            Language::Odia => "Odia",
            Language::English => "English",
        }
    }

    /// Speech-recognition locale (BCP 47), e.g. `"kok-IN"`.
    pub fn locale(self) -> &'static str {
        match self {
            Language::Hindi => "hi-IN",
            Language::Konkani => "kok-IN",
            Language::Kannada => "kn-IN",
            Language::Dogri => "doi-IN",
            Language::Bodo => "brx-IN",
            Language::Urdu => "ur-IN",
            Language::Tamil => "ta-IN",
            Language::Kashmiri => "ks-IN",
            Language::Assamese => "as-IN",
            Language::Bengali => "bn-IN",
            Language::Marathi => "mr-IN",
            Language::Sindhi => "sd-IN",
            Language::Maithili => "mai-IN",
            Language::Punjabi => "pa-IN",
            Language::Malayalam => "ml-IN",
            Language::Manipuri => "mni-IN",
            Language::Telugu => "te-IN",
            Language::Sanskrit => "sa-IN",
            Language::Nepali => "ne-IN",
            Language::Santali => "sat-IN",
            Language::Gujarati => "gu-IN",
            Language::Odia => "or-IN",
            Language::English => "en-IN",
        }
    }

    /// Speech-synthesis locale: the recognition locale with an upper-cased region.
    pub fn tts_locale(self) -> String {
        match self.locale().split_once('-') {
            Some((lang, region)) => format!("{}-{}", lang, region.to_uppercase()),
            None => self.locale().to_string(),
        }
    }

    /// Command words for this language, falling back to English where no
    /// localized set exists.
    pub fn commands(self) -> &'static CommandSet {
        match self {
            Language::Hindi => &CommandSet {
                next: "अगला",
                back: "पीछे",
                submit: "जमा करें",
                repeat: "दोहराएं",
            },
            Language::Tamil => &CommandSet {
                next: "அடுத்து",
                back: "பின்னால்",
                submit: "சமர்ப்பி",
                repeat: "மீண்டும்",
            },
            Language::Telugu => &CommandSet {
                next: "తదుపరి",
                back: "వెనక్కి",
                submit: "సమర్పించు",
                repeat: "పునరావృతం",
            },
            Language::Kannada => &CommandSet {
                next: "ಮುಂದಿನ",
                back: "ಹಿಂದೆ",
                submit: "ಸಲ್ಲಿಸು",
                repeat: "ಪುನರಾವರ್ತನೆ",
            },
            Language::Malayalam => &CommandSet {
                next: "അടുത്തത്",
                back: "പിന്നോട്ട്",
                submit: "സമർപ്പിക്കുക",
                repeat: "ആവർത്തിക്കുക",
            },
            Language::Marathi => &CommandSet {
                next: "पुढील",
                back: "मागे",
                submit: "सादर करा",
                repeat: "पुनरावृत्ती",
            },
            Language::Bengali => &CommandSet {
                next: "পরবর্তী",
                back: "পিছনে",
                submit: "জমা দিন",
                repeat: "পুনরাবৃত্তি",
            },
            Language::Gujarati => &CommandSet {
                next: "આગળ",
                back: "પાછળ",
                submit: "સબમિટ કરો",
                repeat: "પુનરાવર્તન",
            },
            Language::Punjabi => &CommandSet {
                next: "ਅਗਲਾ",
                back: "ਪਿੱਛੇ",
                submit: "ਜਮ੍ਹਾ ਕਰੋ",
                repeat: "ਦੁਹਰਾਓ",
            },
            Language::Dogri => &CommandSet {
                next: "अगला",
                back: "पिछे",
                submit: "जमा करो",
                repeat: "दुहराओ",
            },
            _ => &ENGLISH_COMMANDS,
        }
    }

    /// Whether this language has its own command words.
    pub fn has_localized_commands(self) -> bool {
        self == Language::English || *self.commands() != ENGLISH_COMMANDS
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = CatalogError;

    /// Accepts a display name (case-insensitive) or a speech locale.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| {
                lang.name().eq_ignore_ascii_case(needle) || lang.locale().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| CatalogError(needle.to_string()))
    }
}

impl TryFrom<String> for Language {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for &'static str {
    fn from(lang: Language) -> Self {
        lang.name()
    }
}

/// Case-fold and trim raw user input before command matching.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Classify `input` as a command in `language`, if it is exactly one.
///
/// Both the English keyword and the language's localized word match.
/// Anything else, including sentences that merely contain a command word,
/// is an answer.
pub fn match_command(language: Language, input: &str) -> Option<Command> {
    let normalized = normalize(input);
    let local = language.commands();
    [
        (Command::Next, local.next),
        (Command::Back, local.back),
        (Command::Submit, local.submit),
        (Command::Repeat, local.repeat),
    ]
    .into_iter()
    .find(|(command, localized)| {
        normalized == command.keyword() || normalized == localized.to_lowercase()
    })
    .map(|(command, _)| command)
}
