//! Information packets carried over connections.

use crate::error::{PipelineError, Result};
use std::any::{type_name, Any};
use std::fmt;

/// A single packet: either a payload or one of the control markers.
///
/// Connections are typed, so the payload type is checked at compile time.
/// Stages that need a dynamically typed edge use [`Packet<Boxed>`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet<T> {
    /// Ordinary data
    Value(T),
    /// Opens a bracketed group of packets
    ListStart,
    /// Closes the innermost bracketed group
    ListEnd,
    /// No further packets follow on this connection
    EndOfStream,
}

impl<T> Packet<T> {
    /// Wrap a payload
    pub fn value(value: T) -> Self {
        Packet::Value(value)
    }

    /// Open a bracketed group
    pub fn list_start() -> Self {
        Packet::ListStart
    }

    /// Close the innermost bracketed group
    pub fn list_end() -> Self {
        Packet::ListEnd
    }

    /// Mark the end of the stream
    pub fn end_of_stream() -> Self {
        Packet::EndOfStream
    }

    /// Check if this packet carries a payload
    pub fn is_value(&self) -> bool {
        matches!(self, Packet::Value(_))
    }

    /// Check if this packet opens a group
    pub fn is_list_start(&self) -> bool {
        matches!(self, Packet::ListStart)
    }

    /// Check if this packet closes a group
    pub fn is_list_end(&self) -> bool {
        matches!(self, Packet::ListEnd)
    }

    /// Check if this packet ends the stream
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Packet::EndOfStream)
    }

    /// Take the payload, if this is a value packet
    pub fn into_value(self) -> Option<T> {
        match self {
            Packet::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the payload, if this is a value packet
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Packet::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Transform the payload, leaving control markers untouched
    pub fn map<U, F>(self, f: F) -> Packet<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Packet::Value(v) => Packet::Value(f(v)),
            Packet::ListStart => Packet::ListStart,
            Packet::ListEnd => Packet::ListEnd,
            Packet::EndOfStream => Packet::EndOfStream,
        }
    }

    /// Re-type a control marker for another connection.
    ///
    /// A value packet cannot change type this way; its payload is handed back in `Err`.
    pub fn cast<U>(self) -> std::result::Result<Packet<U>, T> {
        match self {
            Packet::Value(v) => Err(v),
            Packet::ListStart => Ok(Packet::ListStart),
            Packet::ListEnd => Ok(Packet::ListEnd),
            Packet::EndOfStream => Ok(Packet::EndOfStream),
        }
    }
}

/// A type-erased payload for edges whose element type is only known at run time.
pub struct Boxed {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Boxed {
    /// Erase the type of `value`
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the type stored in this payload
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the stored value is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Recover the original value, failing if `T` is not the stored type
    pub fn downcast<T: Any>(self) -> Result<T> {
        let found = self.type_name;
        self.value
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| PipelineError::TypeMismatch {
                expected: type_name::<T>(),
                found,
            })
    }

    /// Borrow the stored value, failing if `T` is not the stored type
    pub fn downcast_ref<T: Any>(&self) -> Result<&T> {
        self.value
            .downcast_ref::<T>()
            .ok_or(PipelineError::TypeMismatch {
                expected: type_name::<T>(),
                found: self.type_name,
            })
    }
}

impl fmt::Debug for Boxed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boxed")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl Packet<Boxed> {
    /// Box any value into a dynamically typed packet
    pub fn boxed<T: Any + Send>(value: T) -> Self {
        Packet::Value(Boxed::new(value))
    }

    /// Convert to a statically typed packet; control markers always succeed
    pub fn into_typed<T: Any>(self) -> Result<Packet<T>> {
        match self.cast::<T>() {
            Ok(control) => Ok(control),
            Err(boxed) => boxed.downcast::<T>().map(Packet::Value),
        }
    }
}
