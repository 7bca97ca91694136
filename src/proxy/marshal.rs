//! Converting [`Value`]s into argument words and back.
//!
//! A [`Frame`] owns all storage a call refers to by pointer: wide strings, GUIDs passed by
//! reference and the cells out and in-out parameters are written to. The argument words
//! are only produced once the frame is complete, so no storage moves after its address
//! was taken.

use std::mem::size_of;

use uguid::Guid;
use widestring::U16CString;

use crate::{
    interface::{Direction, MarshalType, MethodSignature, ParameterSpec},
    proxy::{Hresult, Value},
    Error, Result,
};

/// Native word size of the running target.
pub(crate) const WORD: usize = size_of::<usize>();

/// Argument words after `this` the trampoline can forward.
pub(crate) const MAX_WORDS: usize = 12;

/// In-memory width of a value of `ty`.
pub(crate) fn width(ty: MarshalType) -> usize {
    match ty {
        MarshalType::Void => 0,
        MarshalType::I8 | MarshalType::U8 => 1,
        MarshalType::VariantBool | MarshalType::I16 | MarshalType::U16 => 2,
        MarshalType::Bool
        | MarshalType::I32
        | MarshalType::U32
        | MarshalType::F32
        | MarshalType::HResult => 4,
        MarshalType::I64 | MarshalType::U64 | MarshalType::F64 => 8,
        MarshalType::Pointer | MarshalType::WideString | MarshalType::Interface => WORD,
        MarshalType::Guid => 16,
    }
}

/// Scalar bits of `value` as a `ty`, signed kinds sign-extended.
fn bits(ty: MarshalType, value: &Value) -> Option<u64> {
    let bits = match (ty, value) {
        (MarshalType::Bool, Value::Bool(flag)) => u64::from(*flag),
        (MarshalType::VariantBool, Value::Bool(flag)) => {
            if *flag {
                0xFFFF
            } else {
                0
            }
        }
        (MarshalType::I8, Value::I8(value)) => i64::from(*value) as u64,
        (MarshalType::U8, Value::U8(value)) => u64::from(*value),
        (MarshalType::I16, Value::I16(value)) => i64::from(*value) as u64,
        (MarshalType::U16, Value::U16(value)) => u64::from(*value),
        (MarshalType::I32, Value::I32(value)) => i64::from(*value) as u64,
        (MarshalType::U32, Value::U32(value)) => u64::from(*value),
        (MarshalType::I64, Value::I64(value)) => *value as u64,
        (MarshalType::U64, Value::U64(value)) => *value,
        (MarshalType::F32, Value::F32(value)) => u64::from(value.to_bits()),
        (MarshalType::F64, Value::F64(value)) => value.to_bits(),
        (MarshalType::HResult, Value::HResult(status)) => u64::from(status.0 as u32),
        (MarshalType::Pointer | MarshalType::WideString, Value::Ptr(address))
        | (MarshalType::Interface, Value::Interface(address) | Value::Ptr(address)) => {
            *address as u64
        }
        _ => return None,
    };
    Some(bits)
}

/// Interpret the low bits of `raw` as a `ty`. `Guid` has no scalar form.
pub(crate) fn decode(ty: MarshalType, raw: u64) -> Value {
    match ty {
        MarshalType::Void | MarshalType::Guid => Value::Void,
        MarshalType::Bool => Value::Bool(raw as u32 != 0),
        MarshalType::VariantBool => Value::Bool(raw as u16 != 0),
        MarshalType::I8 => Value::I8(raw as u8 as i8),
        MarshalType::U8 => Value::U8(raw as u8),
        MarshalType::I16 => Value::I16(raw as u16 as i16),
        MarshalType::U16 => Value::U16(raw as u16),
        MarshalType::I32 => Value::I32(raw as u32 as i32),
        MarshalType::U32 => Value::U32(raw as u32),
        MarshalType::I64 => Value::I64(raw as i64),
        MarshalType::U64 => Value::U64(raw),
        MarshalType::F32 => Value::F32(f32::from_bits(raw as u32)),
        MarshalType::F64 => Value::F64(f64::from_bits(raw)),
        MarshalType::HResult => Value::HResult(Hresult(raw as u32 as i32)),
        MarshalType::Pointer | MarshalType::WideString => Value::Ptr(raw as usize),
        MarshalType::Interface => Value::Interface(raw as usize),
    }
}

/// Storage behind an out or in-out parameter, large and aligned enough for any kind.
///
/// COM targets are little-endian; values are stored in their native layout.
#[repr(C, align(8))]
#[derive(Debug, Default, Clone, Copy)]
struct OutCell {
    bytes: [u8; 16],
}

impl OutCell {
    fn store(&mut self, ty: MarshalType, value: &Value) -> Option<()> {
        if let (MarshalType::Guid, Value::Guid(guid)) = (ty, value) {
            self.bytes = guid.to_bytes();
            return Some(());
        }

        let width = width(ty);
        let raw = bits(ty, value)?.to_le_bytes();
        self.bytes[..width].copy_from_slice(&raw[..width]);
        Some(())
    }

    fn read(&self, ty: MarshalType) -> Value {
        if ty == MarshalType::Guid {
            return Value::Guid(Guid::from_bytes(self.bytes));
        }

        let mut raw = [0_u8; 8];
        raw.copy_from_slice(&self.bytes[..8]);
        decode(ty, u64::from_le_bytes(raw))
    }
}

#[derive(Debug, Clone, Copy)]
enum Word {
    Immediate(usize),
    Text(usize),
    Guid(usize),
    Cell(usize),
}

#[derive(Debug)]
struct Output {
    name: String,
    ty: MarshalType,
    cell: usize,
    retval: bool,
}

/// The marshaled arguments of one call.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    plan: Vec<Word>,
    strings: Vec<U16CString>,
    guids: Vec<Guid>,
    cells: Vec<OutCell>,
    outputs: Vec<Output>,
}

impl Frame {
    /// Lay out `args`, the values for the in and in-out parameters of `signature` in
    /// declaration order.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentMismatch`] if the count or a kind does not match.
    pub(crate) fn marshal(signature: &MethodSignature, args: &[Value]) -> Result<Frame> {
        let mismatch = |index: usize, message: String| Error::ArgumentMismatch {
            method: signature.name.clone(),
            index,
            message,
        };

        let expected = signature.inputs().count();
        if args.len() != expected {
            return Err(mismatch(
                args.len().min(expected),
                format!("expected {expected} arguments, got {}", args.len()),
            ));
        }

        let mut frame = Frame::default();
        let mut supplied = args.iter().enumerate();
        for param in &signature.params {
            if param.direction == Direction::Out {
                frame.push_cell(param, OutCell::default());
                continue;
            }

            let Some((index, value)) = supplied.next() else {
                return Err(mismatch(args.len(), format!("no value for '{}'", param.name)));
            };
            let wrong_kind = || {
                mismatch(
                    index,
                    format!(
                        "'{}' expects {}, got {}",
                        param.name,
                        param.ty,
                        value.kind()
                    ),
                )
            };

            if param.direction == Direction::InOut {
                let mut cell = OutCell::default();
                cell.store(param.ty, value).ok_or_else(wrong_kind)?;
                frame.push_cell(param, cell);
            } else {
                frame.push_input(param.ty, value).ok_or_else(wrong_kind)?;
            }
        }

        Ok(frame)
    }

    fn push_cell(&mut self, param: &ParameterSpec, cell: OutCell) {
        self.outputs.push(Output {
            name: param.name.clone(),
            ty: param.ty,
            cell: self.cells.len(),
            retval: param.retval,
        });
        self.plan.push(Word::Cell(self.cells.len()));
        self.cells.push(cell);
    }

    fn push_input(&mut self, ty: MarshalType, value: &Value) -> Option<()> {
        match (ty, value) {
            (MarshalType::Guid, Value::Guid(guid)) => {
                self.plan.push(Word::Guid(self.guids.len()));
                self.guids.push(*guid);
            }
            (MarshalType::WideString, Value::WideStr(text)) => {
                self.plan.push(Word::Text(self.strings.len()));
                self.strings.push(text.clone());
            }
            _ => {
                let raw = bits(ty, value)?;
                if ty.words(WORD) == 2 {
                    // low word first
                    self.plan.push(Word::Immediate(raw as u32 as usize));
                    self.plan.push(Word::Immediate((raw >> 32) as usize));
                } else {
                    self.plan.push(Word::Immediate(raw as usize));
                }
            }
        }
        Some(())
    }

    /// The argument words after `this`.
    ///
    /// Pointer words stay valid as long as the frame is alive.
    pub(crate) fn words(&mut self) -> Vec<usize> {
        let cells = self.cells.as_mut_ptr();
        let guids = self.guids.as_ptr();

        self.plan
            .iter()
            .map(|word| match *word {
                Word::Immediate(value) => value,
                Word::Text(index) => self.strings[index].as_ptr() as usize,
                Word::Guid(index) => guids.wrapping_add(index) as usize,
                Word::Cell(index) => cells.wrapping_add(index) as usize,
            })
            .collect()
    }

    /// Read back the out and in-out parameters, and the position of the `[retval]`.
    pub(crate) fn outputs(&self) -> (Vec<(String, Value)>, Option<usize>) {
        let values = self
            .outputs
            .iter()
            .map(|output| (output.name.clone(), self.cells[output.cell].read(output.ty)))
            .collect();
        let retval = self.outputs.iter().position(|output| output.retval);
        (values, retval)
    }
}
