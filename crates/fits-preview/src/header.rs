//! FITS header card parsing and keyword lookup.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::str;

use crate::block::{card_at, padded_byte_len, CARDS_PER_BLOCK, CARD_SIZE};
use crate::error::{Error, Result};
use crate::value::{parse_value, Value};

/// A parsed FITS header card (one 80-byte keyword record).
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword name, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if the card has a value indicator (`= ` in bytes 8..10).
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    /// Return the keyword as a trimmed string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map_or(0, |i| i + 1);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    pub fn is_end(&self) -> bool {
        &self.keyword == b"END     "
    }
}

const COMMENTARY_KEYWORDS: [&[u8; 8]; 3] = [b"COMMENT ", b"HISTORY ", b"        "];

/// Parse a single 80-byte card.
pub fn parse_card(bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&bytes[..8]);

    if !keyword
        .iter()
        .all(|b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_'))
    {
        return Err(Error::InvalidKeyword);
    }

    let has_value = !COMMENTARY_KEYWORDS.contains(&&keyword) && &bytes[8..10] == b"= ";
    if has_value {
        if let Some((value, comment)) = parse_value(&bytes[10..]) {
            return Ok(Card {
                keyword,
                value: Some(value),
                comment: comment.map(String::from),
            });
        }
    }

    let text = str::from_utf8(&bytes[8..])
        .map_err(|_| Error::InvalidHeader("non-ASCII text in header card"))?
        .trim_end();
    Ok(Card {
        keyword,
        value: None,
        comment: (!text.is_empty()).then(|| String::from(text)),
    })
}

/// The ordered cards of one HDU header, without the END card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    /// Parse cards from the start of `data` until the END card.
    ///
    /// Returns the header and the number of bytes it occupies on disk (a
    /// whole number of blocks). Only complete blocks are scanned.
    pub fn parse(data: &[u8]) -> Result<(Header, usize)> {
        let full_blocks = data.len() / (CARDS_PER_BLOCK * CARD_SIZE);
        let mut cards = Vec::new();
        for index in 0..full_blocks * CARDS_PER_BLOCK {
            let bytes = card_at(data, index).ok_or(Error::UnexpectedEof)?;
            let card = parse_card(bytes)?;
            if card.is_end() {
                return Ok((Header { cards }, padded_byte_len((index + 1) * CARD_SIZE)));
            }
            cards.push(card);
        }
        Err(Error::UnexpectedEof)
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        Header { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn first_keyword(&self) -> Option<&str> {
        self.cards.first().map(Card::keyword_str)
    }

    /// First value recorded for `keyword`.
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|c| c.value.is_some() && c.keyword_str() == keyword)
            .and_then(|c| c.value.as_ref())
    }

    pub fn integer(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(Value::as_integer)
    }

    pub fn float(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(Value::as_float)
    }

    pub fn logical(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(Value::as_logical)
    }

    /// String value with surrounding blanks removed.
    pub fn string(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(Value::as_str).map(str::trim)
    }

    /// Integer keyword that must be present.
    pub fn required_integer(&self, keyword: &'static str) -> Result<i64> {
        self.integer(keyword).ok_or(Error::MissingKeyword(keyword))
    }

    /// Read the `{prefix}1 ..= {prefix}{count}` axis lengths.
    pub fn axes(&self, prefix: &str, count: usize, missing: &'static str) -> Result<Vec<usize>> {
        (1..=count)
            .map(|i| {
                let n = self
                    .integer(&format!("{prefix}{i}"))
                    .ok_or(Error::MissingKeyword(missing))?;
                usize::try_from(n).map_err(|_| Error::InvalidHeader("negative axis length"))
            })
            .collect()
    }

    /// The `EXTNAME` value, if any.
    pub fn extname(&self) -> Option<&str> {
        self.string("EXTNAME")
    }
}
