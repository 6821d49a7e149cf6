//! vCard 4.0 serializer.
//!
//! Produces CRLF line endings and folds at 75 octets per RFC 6350 §3.2.

use cardea_core::card::CardDocument;

use crate::error::{Error, Result};

// ─── RFC 6350 line folding ────────────────────────────────────────────────────

/// Emit `s` as one logical line, folding at 75 octets with CRLF + SP
/// continuation.
pub(crate) fn fold_line(s: &str) -> String {
  if s.len() <= 75 {
    return format!("{}\r\n", s);
  }

  let mut result = String::new();
  let total = s.len();
  let mut pos = 0usize;
  let mut first = true;

  while pos < total {
    let limit = if first { 75 } else { 74 };
    let end   = if pos + limit >= total {
      total
    } else {
      // Walk back to the nearest valid UTF-8 char boundary
      let mut e = pos + limit;
      while e > pos && !s.is_char_boundary(e) {
        e -= 1;
      }
      // Guarantee at least one byte per segment
      if e == pos { pos + 1 } else { e }
    };

    if !first {
      result.push(' ');
    }
    result.push_str(&s[pos..end]);
    result.push_str("\r\n");
    pos   = end;
    first = false;
  }

  result
}

// ─── Value escaping ───────────────────────────────────────────────────────────

/// Escape a full property value: `\`, `,`, `;`, `\n`.
fn escape_value(s: &str) -> String {
  s.replace('\\', "\\\\")
   .replace(',', "\\,")
   .replace(';', "\\;")
   .replace('\n', "\\n")
}

// ─── Serializer ───────────────────────────────────────────────────────────────

pub(crate) fn serialize(card: &CardDocument) -> Result<String> {
  let contact = &card.contact;
  if contact.full_name.trim().is_empty() {
    return Err(Error::MissingName);
  }

  let mut out = String::new();
  out.push_str(&fold_line("BEGIN:VCARD"));
  out.push_str(&fold_line("VERSION:4.0"));
  out.push_str(&fold_line(&format!("UID:{}", escape_value(&card.card_id))));
  out.push_str(&fold_line(&format!("FN:{}", escape_value(&contact.full_name))));

  if let Some(title) = &contact.title {
    out.push_str(&fold_line(&format!("TITLE:{}", escape_value(title))));
  }
  if let Some(company) = &contact.company {
    out.push_str(&fold_line(&format!("ORG:{}", escape_value(company))));
  }
  if let Some(email) = &contact.email {
    out.push_str(&fold_line(&format!(
      "EMAIL;TYPE=WORK:{}",
      escape_value(email)
    )));
  }
  if let Some(phone) = &contact.phone {
    out.push_str(&fold_line(&format!(
      "TEL;TYPE=VOICE:{}",
      escape_value(phone)
    )));
  }
  if let Some(website) = &contact.website {
    // URLs carry their own commas/semicolons; escaping would corrupt them.
    out.push_str(&fold_line(&format!("URL:{website}")));
  }

  out.push_str(&fold_line("END:VCARD"));
  Ok(out)
}

#[cfg(test)]
mod tests {
  use cardea_core::card::{CardContact, CardDocument};
  use chrono::Utc;

  use super::*;

  fn card(contact: CardContact) -> CardDocument {
    CardDocument::new("card-test-0001", "owner-1", contact, Utc::now())
  }

  #[test]
  fn full_card_serializes_every_field() {
    let vcf = serialize(&card(CardContact {
      full_name: "Alice Liddell".into(),
      title:     Some("Staff Engineer".into()),
      company:   Some("Acme Corp".into()),
      email:     Some("alice@acme.example".into()),
      phone:     Some("+15555551234".into()),
      website:   Some("https://alice.example".into()),
    }))
    .unwrap();

    assert!(vcf.starts_with("BEGIN:VCARD\r\nVERSION:4.0\r\n"));
    assert!(vcf.contains("UID:card-test-0001\r\n"));
    assert!(vcf.contains("FN:Alice Liddell\r\n"));
    assert!(vcf.contains("TITLE:Staff Engineer\r\n"));
    assert!(vcf.contains("ORG:Acme Corp\r\n"));
    assert!(vcf.contains("EMAIL;TYPE=WORK:alice@acme.example\r\n"));
    assert!(vcf.contains("TEL;TYPE=VOICE:+15555551234\r\n"));
    assert!(vcf.contains("URL:https://alice.example\r\n"));
    assert!(vcf.ends_with("END:VCARD\r\n"));
  }

  #[test]
  fn minimal_card_omits_absent_properties() {
    let vcf = serialize(&card(CardContact {
      full_name: "Bob".into(),
      ..CardContact::default()
    }))
    .unwrap();

    assert!(vcf.contains("FN:Bob\r\n"));
    assert!(!vcf.contains("TITLE"));
    assert!(!vcf.contains("ORG"));
    assert!(!vcf.contains("EMAIL"));
  }

  #[test]
  fn empty_name_is_an_error() {
    let err = serialize(&card(CardContact {
      full_name: "   ".into(),
      ..CardContact::default()
    }))
    .unwrap_err();
    assert!(matches!(err, Error::MissingName));
  }

  #[test]
  fn special_characters_are_escaped() {
    let vcf = serialize(&card(CardContact {
      full_name: "Smith; Jones, & Co\\".into(),
      ..CardContact::default()
    }))
    .unwrap();
    assert!(vcf.contains("FN:Smith\\; Jones\\, & Co\\\\\r\n"));
  }

  #[test]
  fn long_lines_are_folded_at_75_octets() {
    let long_name = "A".repeat(200);
    let vcf = serialize(&card(CardContact {
      full_name: long_name,
      ..CardContact::default()
    }))
    .unwrap();

    for line in vcf.split("\r\n") {
      assert!(line.len() <= 75, "unfolded line: {} octets", line.len());
    }
    // Continuation lines start with a single space.
    assert!(vcf.contains("\r\n A"));
  }

  #[test]
  fn fold_line_preserves_content() {
    let input = "X:".to_owned() + &"y".repeat(300);
    let folded = fold_line(&input);
    let unfolded: String = folded.replace("\r\n ", "").replace("\r\n", "");
    assert_eq!(unfolded, input);
  }
}
