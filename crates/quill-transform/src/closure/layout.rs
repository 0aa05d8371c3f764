//! Carrier layouts
//!
//! A carrier type holds at most `MAX_ARITY` fields. Environments larger
//! than that are split into a chain of segments: each non-final segment
//! holds `MAX_ARITY - 1` values and keeps its last field for the next
//! segment. The final segment may use all `MAX_ARITY` fields.

use crate::error::{ClosureError, Invariant};
use quill_hir::Expr;
use quill_types::{carrier_type, CarrierType, Type};
use std::sync::Arc;

pub const MAX_ARITY: usize = 8;

/// Field that links a segment to the next one
pub const TAIL_SLOT: usize = MAX_ARITY - 1;

const VALUES_PER_LINK: usize = MAX_ARITY - 1;

/// Number of captured values stored in each segment, head first.
///
/// A single value left over for a segment of its own is folded into the
/// previous segment instead, which then has no tail.
pub fn segment_lengths(count: usize) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let mut segments = count / VALUES_PER_LINK + 1;
    let mut last = count % VALUES_PER_LINK;
    if last == 0 {
        last = VALUES_PER_LINK;
        segments -= 1;
    } else if last == 1 && segments > 1 {
        last = MAX_ARITY;
        segments -= 1;
    }

    let mut lengths = vec![VALUES_PER_LINK; segments - 1];
    lengths.push(last);
    lengths
}

#[derive(Debug, Clone)]
pub struct Segment {
    /// Position of the first value of this segment in the environment
    pub start: usize,
    pub len: usize,
    pub carrier: Arc<CarrierType>,
}

impl Segment {
    pub fn has_tail(&self) -> bool {
        self.carrier.arity() > self.len
    }

    fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.start + self.len
    }
}

/// How the values of one captured environment are stored
#[derive(Debug, Clone)]
pub struct CarrierLayout {
    segments: Vec<Segment>,
}

impl CarrierLayout {
    /// Lay out values of the given types, in order
    pub fn new(types: &[Type]) -> Result<Self, ClosureError> {
        let lengths = segment_lengths(types.len());
        if lengths.is_empty() {
            return Err(Invariant::EmptyCarrier.into());
        }

        let mut starts = Vec::with_capacity(lengths.len());
        let mut start = 0;
        for len in &lengths {
            starts.push(start);
            start += len;
        }

        // Tail fields name the next segment's type, so build from the end
        let mut segments = Vec::with_capacity(lengths.len());
        let mut next: Option<Arc<CarrierType>> = None;
        for (&start, &len) in starts.iter().zip(&lengths).rev() {
            let mut fields = types[start..start + len].to_vec();
            if let Some(next) = &next {
                fields.push(next.as_type());
            }
            let carrier = carrier_type(fields);
            next = Some(carrier.clone());
            segments.push(Segment {
                start,
                len,
                carrier,
            });
        }
        segments.reverse();

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of captured values
    pub fn len(&self) -> usize {
        self.segments.iter().map(|segment| segment.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The outermost carrier type, the one a closure receives
    pub fn head(&self) -> &Arc<CarrierType> {
        &self.segments[0].carrier
    }

    pub fn head_type(&self) -> Type {
        self.head().as_type()
    }

    /// Expression building the full carrier chain from `values`, one per
    /// captured slot in environment order.
    pub fn construct(&self, mut values: Vec<Expr>) -> Result<Expr, ClosureError> {
        if values.len() != self.len() {
            return Err(Invariant::CarrierValueCount {
                expected: self.len(),
                found: values.len(),
            }
            .into());
        }

        let mut next: Option<Expr> = None;
        for segment in self.segments.iter().rev() {
            let mut fields = values.split_off(segment.start);
            fields.extend(next.take());
            next = Some(Expr::NewCarrier {
                carrier: segment.carrier.clone(),
                fields,
            });
        }
        next.ok_or_else(|| Invariant::EmptyCarrier.into())
    }

    /// Expression reading the value at `index` from the carrier `head`,
    /// following tail fields through earlier segments.
    pub fn access(&self, index: usize, head: Expr) -> Result<Expr, ClosureError> {
        let position = self
            .segments
            .iter()
            .position(|segment| segment.contains(index))
            .ok_or(Invariant::SlotOutOfRange {
                index,
                len: self.len(),
            })?;

        let mut expr = head;
        for segment in &self.segments[..position] {
            expr = field(expr, &segment.carrier, TAIL_SLOT)?;
        }
        let segment = &self.segments[position];
        field(expr, &segment.carrier, index - segment.start)
    }
}

fn field(carrier: Expr, carrier_type: &Arc<CarrierType>, slot: usize) -> Result<Expr, ClosureError> {
    if carrier_type.field(slot).is_none() {
        return Err(Invariant::MissingCarrierField {
            slot,
            arity: carrier_type.arity(),
        }
        .into());
    }
    Ok(Expr::CarrierField {
        carrier: Box::new(carrier),
        carrier_type: carrier_type.clone(),
        slot,
    })
}
