// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the frame codec for the three algorithm messages, so
//! that a transport crossing process or host boundaries can carry them. The
//! in-process router runs on it too when `Config::framed_transport` is set:
//! it encodes every algorithm message before the channel and the receiving
//! dispatcher decodes it, which is how the tests prove the round-trip against
//! the real delivery path.
//!
//! A frame is a tag byte followed by the message fields in declaration order:
//! names are length-prefixed UTF-8 (u32 little-endian length), stamps are u64
//! little-endian, values and utilities use the encodings supplied by their
//! `Value` / `Utility` implementations. Context maps are a u32 entry count
//! followed by (name, value, stamp) triples, sorted by name so equal contexts
//! produce equal frames.

use crate::{Context, Msg, Utility, Value, WireError};

const TAG_VALUE: u8 = 0x01;
const TAG_COST: u8 = 0x02;
const TAG_TERMINATE: u8 = 0x03;

/// Encodes one algorithm message into a fresh frame.
pub fn encode<V: Value, U: Utility>(msg: &Msg<V, U>) -> Vec<u8> {
    let mut buf = vec![];
    match msg {
        Msg::Value {
            sender,
            receiver,
            value,
            threshold,
            stamp,
        } => {
            buf.push(TAG_VALUE);
            write_name(&mut buf, sender);
            write_name(&mut buf, receiver);
            value.write_to(&mut buf);
            threshold.write_to(&mut buf);
            buf.extend_from_slice(&stamp.to_le_bytes());
        }
        Msg::Cost {
            sender,
            receiver,
            context,
            lb,
            ub,
        } => {
            buf.push(TAG_COST);
            write_name(&mut buf, sender);
            write_name(&mut buf, receiver);
            write_context(&mut buf, context);
            lb.write_to(&mut buf);
            ub.write_to(&mut buf);
        }
        Msg::Terminate {
            sender,
            receiver,
            context,
        } => {
            buf.push(TAG_TERMINATE);
            write_name(&mut buf, sender);
            write_name(&mut buf, receiver);
            write_context(&mut buf, context);
        }
    }
    buf
}

/// Decodes one frame back into a message. The whole frame must be consumed.
pub fn decode<V: Value, U: Utility>(frame: &[u8]) -> Result<Msg<V, U>, WireError> {
    let mut input = frame;
    let tag = *next(&mut input, 1)?.first().ok_or(WireError::Truncated)?;
    let msg = match tag {
        TAG_VALUE => {
            let sender = read_name(&mut input)?;
            let receiver = read_name(&mut input)?;
            let value = V::read_from(&mut input)?;
            let threshold = U::read_from(&mut input)?;
            let stamp = read_u64(&mut input)?;
            Msg::Value {
                sender,
                receiver,
                value,
                threshold,
                stamp,
            }
        }
        TAG_COST => {
            let sender = read_name(&mut input)?;
            let receiver = read_name(&mut input)?;
            let context = read_context(&mut input)?;
            let lb = U::read_from(&mut input)?;
            let ub = U::read_from(&mut input)?;
            Msg::Cost {
                sender,
                receiver,
                context,
                lb,
                ub,
            }
        }
        TAG_TERMINATE => {
            let sender = read_name(&mut input)?;
            let receiver = read_name(&mut input)?;
            let context = read_context(&mut input)?;
            Msg::Terminate {
                sender,
                receiver,
                context,
            }
        }
        other => return Err(WireError::BadTag(other)),
    };
    if input.is_empty() {
        Ok(msg)
    } else {
        Err(WireError::TrailingBytes(input.len()))
    }
}

fn next<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], WireError> {
    if input.len() < n {
        Err(WireError::Truncated)
    } else {
        let (head, tail) = input.split_at(n);
        *input = tail;
        Ok(head)
    }
}

fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
}

fn read_name(input: &mut &[u8]) -> Result<String, WireError> {
    let len = read_u32(input)? as usize;
    let raw = next(input, len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| WireError::BadUtf8)
}

fn read_u32(input: &mut &[u8]) -> Result<u32, WireError> {
    let raw = next(input, 4)?;
    Ok(u32::from_le_bytes(raw.try_into().unwrap()))
}

fn read_u64(input: &mut &[u8]) -> Result<u64, WireError> {
    let raw = next(input, 8)?;
    Ok(u64::from_le_bytes(raw.try_into().unwrap()))
}

fn write_context<V: Value>(buf: &mut Vec<u8>, context: &Context<V>) {
    let mut entries: Vec<_> = context.iter().collect();
    entries.sort_unstable_by_key(|(name, _)| *name);
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (name, stamped) in entries {
        write_name(buf, name);
        stamped.value.write_to(buf);
        buf.extend_from_slice(&stamped.stamp.to_le_bytes());
    }
}

fn read_context<V: Value>(input: &mut &[u8]) -> Result<Context<V>, WireError> {
    let count = read_u32(input)?;
    let mut context = Context::new();
    for _ in 0..count {
        let name = read_name(input)?;
        let value = V::read_from(input)?;
        let stamp = read_u64(input)?;
        context.put(name, value, stamp);
    }
    Ok(context)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_wire {
    use crate::implementation::wire::{decode, encode};
    use crate::*;

    fn sample_context() -> Context<i32> {
        let mut ctx = Context::new();
        ctx.put("x1", 0, 3);
        ctx.put("x0", 2, 11);
        ctx
    }

    #[test]
    fn a_value_frame_round_trips() {
        let msg: Msg<i32, u64> = Msg::Value {
            sender: "x0".to_string(),
            receiver: "x1".to_string(),
            value: -2,
            threshold: u64::plus_inf(),
            stamp: 7,
        };
        assert_eq!(msg, decode(&encode(&msg)).unwrap());
    }

    #[test]
    fn a_cost_frame_round_trips_with_its_context() {
        let msg: Msg<i32, u64> = Msg::Cost {
            sender: "x1".to_string(),
            receiver: "x0".to_string(),
            context: sample_context(),
            lb: 3,
            ub: 12,
        };
        assert_eq!(msg, decode(&encode(&msg)).unwrap());
    }

    #[test]
    fn a_terminate_frame_round_trips() {
        let msg: Msg<i32, u64> = Msg::Terminate {
            sender: "x0".to_string(),
            receiver: "x1".to_string(),
            context: sample_context(),
        };
        assert_eq!(msg, decode(&encode(&msg)).unwrap());
    }

    #[test]
    fn equal_contexts_yield_equal_frames() {
        // insertion order must not leak into the encoding
        let mut a = Context::new();
        a.put("n1", 1, 1);
        a.put("n2", 2, 2);
        let mut b = Context::new();
        b.put("n2", 2, 2);
        b.put("n1", 1, 1);

        let frame = |context: Context<i32>| {
            encode::<i32, u64>(&Msg::Terminate {
                sender: "s".to_string(),
                receiver: "r".to_string(),
                context,
            })
        };
        assert_eq!(frame(a), frame(b));
    }

    #[test]
    fn an_unknown_tag_is_rejected() {
        let outcome = decode::<i32, u64>(&[0x7f, 0, 0, 0, 0]);
        assert_eq!(Err(WireError::BadTag(0x7f)), outcome);
    }

    #[test]
    fn a_truncated_frame_is_rejected() {
        let msg: Msg<i32, u64> = Msg::Value {
            sender: "x0".to_string(),
            receiver: "x1".to_string(),
            value: 5,
            threshold: 0,
            stamp: 1,
        };
        let frame = encode(&msg);
        let outcome = decode::<i32, u64>(&frame[..frame.len() - 1]);
        assert_eq!(Err(WireError::Truncated), outcome);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let msg: Msg<i32, u64> = Msg::Terminate {
            sender: "s".to_string(),
            receiver: "r".to_string(),
            context: Context::new(),
        };
        let mut frame = encode(&msg);
        frame.push(0xaa);
        assert_eq!(
            Err(WireError::TrailingBytes(1)),
            decode::<i32, u64>(&frame)
        );
    }
}
