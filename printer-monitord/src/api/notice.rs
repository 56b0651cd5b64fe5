use serde::Serialize;
use crate::add_printer::{Field, Rejection};

/// Outcome of a form post, carried across the redirect as a short code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Added,
    Rejected(Rejection),
}

#[derive(Debug, Clone, Serialize)]
pub struct NoticeView {
    pub message: String,
    pub error: bool,
}

const CODES: &[(&str, Notice)] = &[
    ("added", Notice::Added),
    ("invalid-name", Notice::Rejected(Rejection::Invalid(Field::Name))),
    ("invalid-location", Notice::Rejected(Rejection::Invalid(Field::Location))),
    ("invalid-address", Notice::Rejected(Rejection::Invalid(Field::Address))),
    ("invalid-department", Notice::Rejected(Rejection::Invalid(Field::Department))),
    ("name-taken", Notice::Rejected(Rejection::NameTaken)),
    ("address-taken", Notice::Rejected(Rejection::AddressTaken)),
    ("unreachable", Notice::Rejected(Rejection::Unreachable)),
    ("unexpected", Notice::Rejected(Rejection::Unexpected)),
    ("unsupported", Notice::Rejected(Rejection::Unsupported)),
];

impl Notice {
    pub fn code(self) -> &'static str {
        CODES
            .iter()
            .find(|(_, notice)| *notice == self)
            .map(|(code, _)| *code)
            .unwrap_or("unexpected")
    }

    /// Unknown codes are ignored
    pub fn from_code(code: &str) -> Option<Self> {
        CODES.iter().find(|(c, _)| *c == code).map(|(_, notice)| *notice)
    }

    pub fn view(self) -> NoticeView {
        match self {
            Notice::Added => NoticeView {
                message: "Printer added.".to_string(),
                error: false,
            },
            Notice::Rejected(rejection) => NoticeView {
                message: rejection.to_string(),
                error: true,
            },
        }
    }
}
