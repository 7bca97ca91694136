//! Method and interface signatures, and the builder the IDL front end feeds them through.

use std::collections::HashSet;

use uguid::Guid;

use crate::{
    interface::types::{CallingConvention, Direction, MarshalType},
    Error, Result,
};

/// One parameter of a method, `this` excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterSpec {
    /// Parameter name from the IDL
    pub name: String,
    /// Marshaling kind; for out-parameters the kind of the pointee
    pub ty: MarshalType,
    /// Data flow direction
    pub direction: Direction,
    /// `[retval]`, the logical return value of the method
    pub retval: bool,
}

impl ParameterSpec {
    /// Words this parameter takes in the argument list.
    #[must_use]
    pub fn words(&self, pointer_size: usize) -> usize {
        if self.direction == Direction::In {
            self.ty.words(pointer_size)
        } else {
            1
        }
    }
}

/// A method as declared in the interface, in vtable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Parameters, `this` excluded
    pub params: Vec<ParameterSpec>,
    /// Return kind, `HResult` for nearly every COM method
    pub ret: MarshalType,
    /// Calling convention
    pub convention: CallingConvention,
}

impl MethodSignature {
    /// A method taking no parameters and returning `HRESULT` with `__stdcall`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodSignature {
            name: name.to_string(),
            params: Vec::new(),
            ret: MarshalType::HResult,
            convention: CallingConvention::Stdcall,
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, name: &str, ty: MarshalType, direction: Direction) -> Self {
        self.params.push(ParameterSpec {
            name: name.to_string(),
            ty,
            direction,
            retval: false,
        });
        self
    }

    /// Append the `[out, retval]` parameter.
    #[must_use]
    pub fn retval(mut self, name: &str, ty: MarshalType) -> Self {
        self.params.push(ParameterSpec {
            name: name.to_string(),
            ty,
            direction: Direction::Out,
            retval: true,
        });
        self
    }

    /// Set the return kind.
    #[must_use]
    pub fn returns(mut self, ret: MarshalType) -> Self {
        self.ret = ret;
        self
    }

    /// Set the calling convention.
    #[must_use]
    pub fn convention(mut self, convention: CallingConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Parameters the caller supplies values for, in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params
            .iter()
            .filter(|param| param.direction.takes_input())
    }

    /// Parameters the callee writes back, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params
            .iter()
            .filter(|param| param.direction.produces_output())
    }

    /// Words of the argument list after `this`.
    #[must_use]
    pub fn argument_words(&self, pointer_size: usize) -> usize {
        self.params
            .iter()
            .map(|param| param.words(pointer_size))
            .sum()
    }

    fn validate(&self, interface: &str) -> Result<()> {
        let invalid = |message: String| Error::InvalidSignature {
            interface: interface.to_string(),
            message,
        };

        let mut names = HashSet::new();
        if let Some(param) = self
            .params
            .iter()
            .find(|param| !names.insert(param.name.as_str()))
        {
            return Err(invalid(format!(
                "parameter '{}' of {} declared twice",
                param.name, self.name
            )));
        }

        let retvals: Vec<_> = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, param)| param.retval)
            .collect();
        match retvals.as_slice() {
            [] => {}
            [(position, param)] => {
                if param.direction != Direction::Out {
                    return Err(invalid(format!(
                        "retval '{}' of {} is not an out-parameter",
                        param.name, self.name
                    )));
                }
                if *position + 1 != self.params.len() {
                    return Err(invalid(format!(
                        "retval '{}' of {} is not the last parameter",
                        param.name, self.name
                    )));
                }
            }
            _ => {
                return Err(invalid(format!(
                    "{} declares {} retval parameters",
                    self.name,
                    retvals.len()
                )))
            }
        }

        if let Some(param) = self.params.iter().find(|param| param.ty == MarshalType::Void) {
            return Err(invalid(format!(
                "parameter '{}' of {} is void",
                param.name, self.name
            )));
        }

        Ok(())
    }
}

/// An interface: its identity, base and own methods in vtable order.
///
/// The methods of base interfaces are not repeated; the [`crate::linker`] walks `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSignature {
    /// Interface name, e.g. `IStream`
    pub name: String,
    /// Interface identifier, if the IDL supplied one
    pub iid: Option<Guid>,
    /// Name of the base interface, `None` only for roots such as `IUnknown`
    pub base: Option<String>,
    /// Methods declared by this interface
    pub methods: Vec<MethodSignature>,
}

impl InterfaceSignature {
    /// Start describing the interface `name`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use comlink::interface::{Direction, InterfaceSignature, MarshalType, MethodSignature};
    ///
    /// let calc = InterfaceSignature::builder("ICalc")
    ///     .base("IUnknown")
    ///     .method(
    ///         MethodSignature::new("Add")
    ///             .param("a", MarshalType::I32, Direction::In)
    ///             .param("b", MarshalType::I32, Direction::In)
    ///             .retval("sum", MarshalType::I32),
    ///     )
    ///     .build()?;
    /// assert_eq!(calc.methods.len(), 1);
    /// # Ok::<(), comlink::Error>(())
    /// ```
    #[must_use]
    pub fn builder(name: &str) -> InterfaceBuilder {
        InterfaceBuilder {
            signature: InterfaceSignature {
                name: name.to_string(),
                iid: None,
                base: None,
                methods: Vec::new(),
            },
        }
    }

    /// The method declared here under `name`.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// Builder for [`InterfaceSignature`].
#[derive(Debug, Clone)]
pub struct InterfaceBuilder {
    signature: InterfaceSignature,
}

impl InterfaceBuilder {
    /// Set the IID.
    #[must_use]
    pub fn iid(mut self, iid: Guid) -> Self {
        self.signature.iid = Some(iid);
        self
    }

    /// Set the base interface.
    #[must_use]
    pub fn base(mut self, base: &str) -> Self {
        self.signature.base = Some(base.to_string());
        self
    }

    /// Append a method.
    #[must_use]
    pub fn method(mut self, method: MethodSignature) -> Self {
        self.signature.methods.push(method);
        self
    }

    /// Validate and finish the signature.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSignature`] for an empty name, an interface that is its own
    /// base, duplicate method or parameter names, void parameters, and `retval` parameters that are not
    /// a single trailing out-parameter.
    pub fn build(self) -> Result<InterfaceSignature> {
        let signature = self.signature;
        let invalid = |message: String| Error::InvalidSignature {
            interface: signature.name.clone(),
            message,
        };

        if signature.name.is_empty() {
            return Err(invalid("empty interface name".to_string()));
        }
        if signature.base.as_deref() == Some(signature.name.as_str()) {
            return Err(Error::InheritanceCycle(signature.name.clone()));
        }

        let mut names = HashSet::new();
        for method in &signature.methods {
            if !names.insert(method.name.as_str()) {
                return Err(invalid(format!("method {} declared twice", method.name)));
            }
            method.validate(&signature.name)?;
        }

        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> MethodSignature {
        MethodSignature::new("Add")
            .param("a", MarshalType::I32, Direction::In)
            .param("b", MarshalType::I64, Direction::In)
            .param("acc", MarshalType::I32, Direction::InOut)
            .retval("sum", MarshalType::I32)
    }

    #[test]
    fn method_shape() {
        let method = add();
        assert_eq!(method.inputs().count(), 3);
        assert_eq!(method.outputs().count(), 2);
        assert_eq!(method.argument_words(8), 4);
        assert_eq!(method.argument_words(4), 5);
        assert_eq!(method.ret, MarshalType::HResult);
    }

    #[test]
    fn builder_validates() {
        let ok = InterfaceSignature::builder("ICalc")
            .base("IUnknown")
            .method(add())
            .build()
            .unwrap();
        assert!(ok.method("Add").is_some());

        let twice = InterfaceSignature::builder("ICalc").method(add()).method(add()).build();
        assert!(matches!(twice, Err(Error::InvalidSignature { .. })));

        let misplaced = InterfaceSignature::builder("ICalc")
            .method(
                MethodSignature::new("Get")
                    .retval("value", MarshalType::I32)
                    .param("flags", MarshalType::U32, Direction::In),
            )
            .build();
        assert!(matches!(misplaced, Err(Error::InvalidSignature { .. })));
    }

    #[test]
    fn retval_position_is_checked_by_index() {
        let method = MethodSignature::new("Get")
            .param("x", MarshalType::I32, Direction::Out)
            .param("y", MarshalType::I32, Direction::In);
        let mut leading = method.clone();
        leading.params.insert(
            0,
            ParameterSpec {
                name: "r".to_string(),
                ty: MarshalType::I32,
                direction: Direction::Out,
                retval: true,
            },
        );
        let error = leading.validate("ICalc").unwrap_err();
        assert!(
            matches!(&error, Error::InvalidSignature { message, .. } if message.contains("not the last")),
            "{error:?}"
        );

        let renamed = method.clone().retval("x", MarshalType::I32);
        let error = renamed.validate("ICalc").unwrap_err();
        assert!(
            matches!(&error, Error::InvalidSignature { message, .. } if message.contains("declared twice")),
            "{error:?}"
        );

        let built = InterfaceSignature::builder("ICalc")
            .method(method.retval("z", MarshalType::I32))
            .build()
            .unwrap();
        assert_eq!(built.methods[0].params.len(), 3);
    }

    #[test]
    fn own_base_is_a_cycle() {
        let own_base = InterfaceSignature::builder("ILoop").base("ILoop").build();
        assert!(matches!(own_base, Err(Error::InheritanceCycle(_))));
    }
}
