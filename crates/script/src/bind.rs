//! Typed binding of native Rust callables into the engine.
//!
//! One macro-generated mechanism covers every supported arity (0..=8) for
//! free functions, capturing closures, member functions (a method plus an
//! `Rc<RefCell<T>>` receiver) and class constructors. Binding produces a
//! uniform [`NativeCallable`] that pulls its arguments off the evaluation
//! stack through [`Transit`], plus the [`Signature`] metadata the registry
//! stores: arity, parameter type names, compatibility checks, defaults and
//! the return type.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use argus_interp::Value;

use crate::engine::ScriptEngine;
use crate::error::{ScriptError, ScriptResult};
use crate::marshal::Transit;

/// Uniform native callable.
///
/// The callable pops its own arguments off the engine's evaluation stack
/// (in call order) and returns the marshalled return value, if any.
pub type NativeCallable = Rc<dyn Fn(&mut ScriptEngine) -> ScriptResult<Option<Value>>>;

/// Callable that constructs a class instance object.
pub type CtorCallable = Rc<dyn Fn(&mut ScriptEngine) -> ScriptResult<Rc<dyn Any>>>;

/// Signature metadata captured at bind time.
#[derive(Clone)]
pub struct Signature {
    /// Canonical parameter type names, in call order.
    pub param_types: Vec<String>,

    /// Canonical return type name.
    pub ret_type: String,

    /// Per-parameter runtime compatibility checks.
    pub checks: Vec<fn(&Value) -> bool>,

    /// Default parameter values, used to seed the defaults and last-exec
    /// vectors.
    pub defaults: Vec<Value>,

    /// False for void-returning callables.
    pub returns_value: bool,
}

impl Signature {
    /// Number of parameters the callable consumes.
    pub fn num_params(&self) -> usize {
        self.param_types.len()
    }

    /// Parameter-only signature, e.g. `f32, f32, f32`.
    pub fn param_sig(&self) -> String {
        self.param_types.join(", ")
    }

    /// Signature with return type, e.g. `(f32) -> void`.
    pub fn sig(&self) -> String {
        format!("({}) -> {}", self.param_sig(), self.ret_type)
    }

    /// Signature with the function name, e.g. `iso.set(f32) -> void`.
    pub fn sig_with_name(&self, name: &str) -> String {
        format!("{}({}) -> {}", name, self.param_sig(), self.ret_type)
    }
}

/// A bound native function: the callable plus its signature.
pub struct BoundFunction {
    pub callable: NativeCallable,
    pub signature: Signature,
}

/// A bound class constructor.
pub struct BoundConstructor {
    pub construct: CtorCallable,
    pub signature: Signature,
}

/// Adapts native return values to the dispatch result convention.
///
/// Implemented for `ScriptResult<T>` (failures propagate to the caller) and
/// for the plain transit types, so infallible natives need no wrapping.
pub trait IntoCallResult {
    type Output: Transit;

    fn into_call_result(self) -> ScriptResult<Self::Output>;
}

impl<T: Transit> IntoCallResult for ScriptResult<T> {
    type Output = T;

    fn into_call_result(self) -> ScriptResult<T> {
        self
    }
}

macro_rules! impl_into_call_result_plain {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoCallResult for $t {
                type Output = $t;

                fn into_call_result(self) -> ScriptResult<$t> {
                    Ok(self)
                }
            }
        )*
    };
}

impl_into_call_result_plain!(
    (),
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    crate::marshal::Bytes,
    crate::marshal::Record,
    crate::marshal::TableRef,
    crate::classes::ClassInstance,
);

impl<T: Transit> IntoCallResult for Vec<T> {
    type Output = Vec<T>;

    fn into_call_result(self) -> ScriptResult<Vec<T>> {
        Ok(self)
    }
}

impl<T: Transit, const N: usize> IntoCallResult for [T; N] {
    type Output = [T; N];

    fn into_call_result(self) -> ScriptResult<[T; N]> {
        Ok(self)
    }
}

macro_rules! impl_into_call_result_tuple {
    ($($t:ident),+) => {
        impl<$($t: Transit),+> IntoCallResult for ($($t,)+) {
            type Output = ($($t,)+);

            fn into_call_result(self) -> ScriptResult<($($t,)+)> {
                Ok(self)
            }
        }
    };
}

impl_into_call_result_tuple!(A, B);
impl_into_call_result_tuple!(A, B, C);
impl_into_call_result_tuple!(A, B, C, D);

/// A native free function or closure bindable at the given arity.
pub trait NativeFn<Args> {
    /// Binds into a callable plus signature metadata.
    fn bind(self) -> BoundFunction;
}

/// A member function bindable against an `Rc<RefCell<T>>` receiver.
pub trait MethodFn<T, Args> {
    /// Binds into a callable that borrows the receiver for each call.
    fn bind_method(self, receiver: Rc<RefCell<T>>) -> BoundFunction;
}

/// A class constructor bindable at the given arity.
///
/// Constructors are fallible: they return `ScriptResult<T>` and a failure
/// yields an invalid instance handle rather than an error at the call site.
pub trait ConstructorFn<Args, T> {
    /// Binds into a constructor callable plus signature metadata.
    fn bind_constructor(self) -> BoundConstructor;
}

/// A native function that re-enters the engine: it receives the engine as
/// its first argument and may dispatch further calls, which record as
/// children of its own provenance entry.
pub trait EngineFn<Args> {
    /// Binds into a callable plus signature metadata. The engine argument
    /// does not appear in the signature.
    fn bind_engine(self) -> BoundFunction;
}

macro_rules! impl_bind_fns {
    ($($p:ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, $($p),*> NativeFn<($($p,)*)> for F
        where
            F: Fn($($p),*) -> R + 'static,
            R: IntoCallResult,
            $($p: Transit + 'static,)*
        {
            fn bind(self) -> BoundFunction {
                let signature = Signature {
                    param_types: vec![$(<$p as Transit>::type_name()),*],
                    ret_type: <R::Output as Transit>::type_name(),
                    checks: vec![$(<$p as Transit>::compatible as fn(&Value) -> bool),*],
                    defaults: vec![$(<$p as Transit>::default_value().into_value()),*],
                    returns_value: !<R::Output as Transit>::IS_VOID,
                };
                let num_params = signature.num_params();
                let f = self;
                let callable: NativeCallable = Rc::new(move |engine: &mut ScriptEngine| {
                    let values = engine.pop_call_args(num_params)?;
                    let mut args = values.iter();
                    $(
                        let $p = <$p as Transit>::from_value(args.next().ok_or_else(|| {
                            ScriptError::runtime("argument vector shorter than arity")
                        })?)?;
                    )*
                    let result = f($($p),*).into_call_result()?;
                    if <R::Output as Transit>::IS_VOID {
                        Ok(None)
                    } else {
                        Ok(Some(result.into_value()))
                    }
                });
                BoundFunction {
                    callable,
                    signature,
                }
            }
        }

        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, T, $($p),*> MethodFn<T, ($($p,)*)> for F
        where
            F: Fn(&mut T, $($p),*) -> R + 'static,
            R: IntoCallResult,
            T: 'static,
            $($p: Transit + 'static,)*
        {
            fn bind_method(self, receiver: Rc<RefCell<T>>) -> BoundFunction {
                let signature = Signature {
                    param_types: vec![$(<$p as Transit>::type_name()),*],
                    ret_type: <R::Output as Transit>::type_name(),
                    checks: vec![$(<$p as Transit>::compatible as fn(&Value) -> bool),*],
                    defaults: vec![$(<$p as Transit>::default_value().into_value()),*],
                    returns_value: !<R::Output as Transit>::IS_VOID,
                };
                let num_params = signature.num_params();
                let f = self;
                let callable: NativeCallable = Rc::new(move |engine: &mut ScriptEngine| {
                    let values = engine.pop_call_args(num_params)?;
                    let mut args = values.iter();
                    $(
                        let $p = <$p as Transit>::from_value(args.next().ok_or_else(|| {
                            ScriptError::runtime("argument vector shorter than arity")
                        })?)?;
                    )*
                    let mut target = receiver.try_borrow_mut().map_err(|_| {
                        ScriptError::runtime("receiver already borrowed during dispatch")
                    })?;
                    let result = f(&mut target, $($p),*).into_call_result()?;
                    if <R::Output as Transit>::IS_VOID {
                        Ok(None)
                    } else {
                        Ok(Some(result.into_value()))
                    }
                });
                BoundFunction {
                    callable,
                    signature,
                }
            }
        }

        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, T, $($p),*> ConstructorFn<($($p,)*), T> for F
        where
            F: Fn($($p),*) -> ScriptResult<T> + 'static,
            T: 'static,
            $($p: Transit + 'static,)*
        {
            fn bind_constructor(self) -> BoundConstructor {
                let signature = Signature {
                    param_types: vec![$(<$p as Transit>::type_name()),*],
                    ret_type: "instance".to_string(),
                    checks: vec![$(<$p as Transit>::compatible as fn(&Value) -> bool),*],
                    defaults: vec![$(<$p as Transit>::default_value().into_value()),*],
                    returns_value: true,
                };
                let num_params = signature.num_params();
                let f = self;
                let construct: CtorCallable = Rc::new(move |engine: &mut ScriptEngine| {
                    let values = engine.pop_call_args(num_params)?;
                    let mut args = values.iter();
                    $(
                        let $p = <$p as Transit>::from_value(args.next().ok_or_else(|| {
                            ScriptError::runtime("argument vector shorter than arity")
                        })?)?;
                    )*
                    let object = f($($p),*)?;
                    Ok(Rc::new(RefCell::new(object)) as Rc<dyn Any>)
                });
                BoundConstructor {
                    construct,
                    signature,
                }
            }
        }

        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, $($p),*> EngineFn<($($p,)*)> for F
        where
            F: Fn(&mut ScriptEngine, $($p),*) -> R + 'static,
            R: IntoCallResult,
            $($p: Transit + 'static,)*
        {
            fn bind_engine(self) -> BoundFunction {
                let signature = Signature {
                    param_types: vec![$(<$p as Transit>::type_name()),*],
                    ret_type: <R::Output as Transit>::type_name(),
                    checks: vec![$(<$p as Transit>::compatible as fn(&Value) -> bool),*],
                    defaults: vec![$(<$p as Transit>::default_value().into_value()),*],
                    returns_value: !<R::Output as Transit>::IS_VOID,
                };
                let num_params = signature.num_params();
                let f = self;
                let callable: NativeCallable = Rc::new(move |engine: &mut ScriptEngine| {
                    let values = engine.pop_call_args(num_params)?;
                    let mut args = values.iter();
                    $(
                        let $p = <$p as Transit>::from_value(args.next().ok_or_else(|| {
                            ScriptError::runtime("argument vector shorter than arity")
                        })?)?;
                    )*
                    let result = f(engine, $($p),*).into_call_result()?;
                    if <R::Output as Transit>::IS_VOID {
                        Ok(None)
                    } else {
                        Ok(Some(result.into_value()))
                    }
                });
                BoundFunction {
                    callable,
                    signature,
                }
            }
        }
    };
}

impl_bind_fns!();
impl_bind_fns!(P1);
impl_bind_fns!(P1, P2);
impl_bind_fns!(P1, P2, P3);
impl_bind_fns!(P1, P2, P3, P4);
impl_bind_fns!(P1, P2, P3, P4, P5);
impl_bind_fns!(P1, P2, P3, P4, P5, P6);
impl_bind_fns!(P1, P2, P3, P4, P5, P6, P7);
impl_bind_fns!(P1, P2, P3, P4, P5, P6, P7, P8);

/// Argument packs for the typed call entry points (`cexec`, `setDefaults`).
pub trait ParamPack {
    /// Marshals the pack into an argument vector, in call order.
    fn into_values(self) -> Vec<Value>;
}

macro_rules! impl_param_pack {
    ($($p:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($p: Transit),*> ParamPack for ($($p,)*) {
            fn into_values(self) -> Vec<Value> {
                let ($($p,)*) = self;
                vec![$($p.into_value()),*]
            }
        }
    };
}

impl_param_pack!();
impl_param_pack!(P1);
impl_param_pack!(P1, P2);
impl_param_pack!(P1, P2, P3);
impl_param_pack!(P1, P2, P3, P4);
impl_param_pack!(P1, P2, P3, P4, P5);
impl_param_pack!(P1, P2, P3, P4, P5, P6);
impl_param_pack!(P1, P2, P3, P4, P5, P6, P7);
impl_param_pack!(P1, P2, P3, P4, P5, P6, P7, P8);
