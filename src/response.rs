//! Decoding of the XML bodies returned by the bot API.
//!
//! Responses look like
//!
//! ```xml
//! <rsp stat="ok">
//!   <users>
//!     <user>
//!       <userkey>a1b2</userkey>
//!       <network>Jabber</network>
//!       <screenname>alice@example.com</screenname>
//!     </user>
//!   </users>
//!   <count>1</count>
//! </rsp>
//! ```
//!
//! with `<err code=".." msg=".."/>` in place of the payload on failure.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;

use crate::error::ClientError;
use crate::models::{ApiFault, ApiMethod, SendResult, UserList, UserRecord};

#[derive(Debug, Default)]
struct Document {
    status: Option<String>,
    fault: Option<ApiFault>,
    users: Vec<UserRecord>,
    users_present: bool,
    count: Option<usize>,
}

pub fn decode_send_result(body: &[u8]) -> Result<SendResult, ClientError> {
    let doc = parse_document(body).map_err(|detail| ClientError::InvalidResponse {
        method: ApiMethod::Send,
        detail,
    })?;
    Ok(SendResult {
        status: doc.status,
        fault: doc.fault,
    })
}

pub fn decode_user_list(body: &[u8]) -> Result<UserList, ClientError> {
    let doc = parse_document(body).map_err(|detail| ClientError::InvalidResponse {
        method: ApiMethod::GetAllUsers,
        detail,
    })?;
    let count = doc.count.unwrap_or(doc.users.len());
    Ok(UserList {
        users: doc.users,
        count,
        status: doc.status,
        fault: doc.fault,
        users_present: doc.users_present,
    })
}

fn parse_document(xml: &[u8]) -> Result<Document, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut doc = Document::default();
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut current_user: Option<UserBuilder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                handle_attributes(&e, &name, stack.is_empty(), &mut doc)?;
                saw_root = true;
                if parent_is_users(&stack) {
                    current_user = Some(UserBuilder::default());
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                handle_attributes(&e, &name, stack.is_empty(), &mut doc)?;
                saw_root = true;
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if parent_is_users(&stack)
                    && let Some(builder) = current_user.take()
                {
                    match builder.build() {
                        Some(user) => doc.users.push(user),
                        None => tracing::warn!("Skipping user record without a userkey"),
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| format!("XML parse error: {e}"))?;
                handle_text(&text, &stack, &mut current_user, &mut doc)?;
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| format!("CDATA is not valid UTF-8: {e}"))?;
                handle_text(&text, &stack, &mut current_user, &mut doc)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("document has no root element".to_string());
    }
    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{open}>"));
    }

    Ok(doc)
}

fn handle_text(
    text: &str,
    stack: &[String],
    current_user: &mut Option<UserBuilder>,
    doc: &mut Document,
) -> Result<(), String> {
    let Some(element) = stack.last().filter(|_| !text.is_empty()) else {
        return Ok(());
    };
    if let Some(user) = current_user {
        if in_user_field(stack) {
            user.fields
                .entry(element.clone())
                .or_default()
                .push_str(text);
        }
    } else if element == "count" {
        doc.count = Some(parse_count(text)?);
    } else if element == "err" {
        doc.fault
            .get_or_insert_with(ApiFault::default)
            .message
            .get_or_insert_with(|| text.to_string());
    }
    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn handle_attributes(
    e: &BytesStart<'_>,
    name: &str,
    is_root: bool,
    doc: &mut Document,
) -> Result<(), String> {
    if is_root {
        doc.status = attribute(e, "stat")?;
    }
    match name {
        "err" => {
            let fault = doc.fault.get_or_insert_with(ApiFault::default);
            fault.code = attribute(e, "code")?;
            fault.message = attribute(e, "msg")?;
        }
        "users" => {
            doc.users_present = true;
            if let Some(count) = attribute(e, "count")? {
                doc.count = Some(parse_count(&count)?);
            }
        }
        _ => {}
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, String> {
    let attr = e
        .try_get_attribute(key)
        .map_err(|e| format!("Invalid attribute: {e}"))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|e| format!("Invalid attribute value: {e}"))
    })
    .transpose()
}

fn parse_count(text: &str) -> Result<usize, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("count is not a number: {text}"))
}

/// True when the innermost open element is `users`.
fn parent_is_users(stack: &[String]) -> bool {
    stack.last().is_some_and(|n| n == "users")
}

/// True when the innermost open element is a field of a user record.
fn in_user_field(stack: &[String]) -> bool {
    stack.len() >= 3 && stack[stack.len() - 3] == "users"
}

#[derive(Default)]
struct UserBuilder {
    fields: BTreeMap<String, String>,
}

impl UserBuilder {
    fn build(mut self) -> Option<UserRecord> {
        let userkey = self.fields.remove("userkey").filter(|k| !k.is_empty())?;
        Some(UserRecord {
            userkey,
            network: self.fields.remove("network"),
            screenname: self.fields.remove("screenname"),
            status: self.fields.remove("status"),
            extra: self.fields,
        })
    }
}
