//! Item contract and serialization adapters
//!
//! An item is anything that can write its value into a byte sink and read it
//! back from a byte source. The stores never look inside an item; how the
//! bytes are laid out is entirely up to the adapter.

use super::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};

/// Value that can be stored under a key
///
/// `read_from` must leave the item untouched when decoding fails, so a failed
/// read never exposes a half-decoded value.
pub trait Item: Send + Sync {
    /// Serialize the value into `sink`, returning the number of bytes written
    fn write_to(&self, sink: &mut dyn Write) -> Result<u64>;

    /// Replace the value with one decoded from `source`, returning the number
    /// of bytes consumed
    fn read_from(&mut self, source: &mut dyn Read) -> Result<u64>;
}

/// Copy the value of `from` into `to` through an in-memory buffer
pub fn transfer(from: &dyn Item, to: &mut dyn Item) -> Result<u64> {
    let mut buf = Vec::new();
    from.write_to(&mut buf)?;
    to.read_from(&mut buf.as_slice())
}

/// Encode an item into a fresh byte vector
pub fn to_bytes(item: &dyn Item) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    item.write_to(&mut buf)?;
    Ok(buf)
}

fn read_all(source: &mut dyn Read) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(data)
}

/// Raw item - value bytes are copied as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub value: Vec<u8>,
}

impl RawItem {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Item for RawItem {
    fn write_to(&self, sink: &mut dyn Write) -> Result<u64> {
        sink.write_all(&self.value)?;
        Ok(self.value.len() as u64)
    }

    fn read_from(&mut self, source: &mut dyn Read) -> Result<u64> {
        self.value = read_all(source)?;
        Ok(self.value.len() as u64)
    }
}

/// JSON item - one JSON record per line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonItem<T> {
    pub value: T,
}

impl<T> JsonItem<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Item for JsonItem<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn write_to(&self, sink: &mut dyn Write) -> Result<u64> {
        let mut line = serde_json::to_vec(&self.value)?;
        line.push(b'\n');
        sink.write_all(&line)?;
        Ok(line.len() as u64)
    }

    fn read_from(&mut self, source: &mut dyn Read) -> Result<u64> {
        let data = read_all(source)?;
        self.value = serde_json::from_slice(&data)?;
        Ok(data.len() as u64)
    }
}

/// MessagePack item - self-describing binary encoding with named fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MsgPackItem<T> {
    pub value: T,
}

impl<T> MsgPackItem<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Item for MsgPackItem<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn write_to(&self, sink: &mut dyn Write) -> Result<u64> {
        let encoded = rmp_serde::to_vec_named(&self.value)?;
        sink.write_all(&encoded)?;
        Ok(encoded.len() as u64)
    }

    fn read_from(&mut self, source: &mut dyn Read) -> Result<u64> {
        let data = read_all(source)?;
        self.value = rmp_serde::from_slice(&data)?;
        Ok(data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Record {
        foo: String,
        bar: i32,
    }

    #[test]
    fn test_raw_item_counts_bytes() {
        let item = RawItem::new("Hello");
        let mut sink = Vec::new();
        assert_eq!(item.write_to(&mut sink).unwrap(), 5);
        assert_eq!(sink, b"Hello");

        let mut copy = RawItem::default();
        assert_eq!(copy.read_from(&mut sink.as_slice()).unwrap(), 5);
        assert_eq!(copy, item);
    }

    #[test]
    fn test_json_item_writes_one_line() {
        let item = JsonItem::new(Record {
            foo: "Hello".into(),
            bar: 1,
        });
        let bytes = to_bytes(&item).unwrap();
        assert_eq!(bytes, b"{\"foo\":\"Hello\",\"bar\":1}\n");
    }

    #[test]
    fn test_failed_decode_keeps_previous_value() {
        let mut item = JsonItem::new(Record {
            foo: "kept".into(),
            bar: 7,
        });
        let result = item.read_from(&mut &b"{not json"[..]);
        assert!(result.is_err());
        assert_eq!(item.value.foo, "kept");
        assert_eq!(item.value.bar, 7);
    }

    #[test]
    fn test_msgpack_item_is_self_describing() {
        let item = MsgPackItem::new(vec!["a".to_string(), "b".to_string()]);
        let bytes = to_bytes(&item).unwrap();

        // Decodable as a generic value without knowing the Rust type
        let generic: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(generic, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_transfer_between_adapters() {
        let json = JsonItem::new(Record {
            foo: "x".into(),
            bar: 2,
        });
        let mut raw = RawItem::default();
        transfer(&json, &mut raw).unwrap();
        assert_eq!(raw.value, b"{\"foo\":\"x\",\"bar\":2}\n");

        let mut back = JsonItem::<Record>::default();
        transfer(&raw, &mut back).unwrap();
        assert_eq!(back.value, json.value);
    }
}
