use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Is2Error;

const ORDER_ID_PATH: [&[u8]; 2] = [b"order", b"orderId"];

/// Extract the order id from an EGI XML response
///
/// Exactly one element at `<root>/order/orderId` must exist and carry text.
pub fn parse_order_id(xml: &[u8]) -> Result<String> {
    let order_ids = find_order_ids(xml)?;

    match order_ids.as_slice() {
        [Some(order_id)] if !order_id.is_empty() => Ok(order_id.clone()),
        [_] => Err(Is2Error::MalformedResponse { found: 0 }.into()),
        _ => Err(Is2Error::MalformedResponse {
            found: order_ids.len(),
        }
        .into()),
    }
}

/// Text of every element at `<root>/order/orderId`, `None` for empty elements
fn find_order_ids(xml: &[u8]) -> Result<Vec<Option<String>>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    // element names from the root down to the current element
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut order_ids = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .context(format!("Malformed XML at position {}", reader.buffer_position()))?
        {
            Event::Start(e) => {
                stack.push(e.name().as_ref().to_vec());
                if is_order_id_path(&stack) {
                    current = Some(String::new());
                }
            }
            Event::Empty(e) => {
                stack.push(e.name().as_ref().to_vec());
                if is_order_id_path(&stack) {
                    order_ids.push(None);
                }
                stack.pop();
            }
            Event::Text(t) => {
                if let (Some(text), true) = (current.as_mut(), is_order_id_path(&stack)) {
                    text.push_str(&t.unescape().context("Invalid text in orderId")?);
                }
            }
            Event::CData(t) => {
                if let (Some(text), true) = (current.as_mut(), is_order_id_path(&stack)) {
                    text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(_) => {
                if is_order_id_path(&stack) {
                    order_ids.push(current.take().filter(|s| !s.is_empty()));
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(order_ids)
}

fn is_order_id_path(stack: &[Vec<u8>]) -> bool {
    stack.len() == ORDER_ID_PATH.len() + 1
        && stack[1..]
            .iter()
            .zip(ORDER_ID_PATH.iter())
            .all(|(name, expected)| name.as_slice() == *expected)
}
