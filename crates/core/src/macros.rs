// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared across the workspace to cut down on
//! boilerplate for simple enums and test builders.

/// Implement `Display` for a unit-like enum by matching each variant to a
/// literal string.
///
/// ```ignore
/// simple_display! {
///     enum WorkspaceType {
///         Mounted => "mounted",
///         Cloned => "cloned",
///         None => "none",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    (enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let text = match self {
                    $(Self::$variant => $text,)+
                };
                write!(f, "{text}")
            }
        }
    };
}

/// Generate a `with_*` builder method for a struct field, for use in test
/// fixtures. Consumes and returns `self`.
///
/// ```ignore
/// builder! {
///     impl Task {
///         with_status(status: TaskStatus) -> status;
///     }
/// }
/// ```
#[macro_export]
macro_rules! builder {
    (impl $ty:ident { $($fn_name:ident($arg:ident: $arg_ty:ty) -> $field:ident;)+ }) => {
        #[cfg(any(test, feature = "test-support"))]
        impl $ty {
            $(
                pub fn $fn_name(mut self, $arg: $arg_ty) -> Self {
                    self.$field = $arg;
                    self
                }
            )+
        }
    };
}

/// Generate plain `set_*` mutator methods for a struct field.
#[macro_export]
macro_rules! setters {
    (impl $ty:ident { $($fn_name:ident($arg:ident: $arg_ty:ty) -> $field:ident;)+ }) => {
        impl $ty {
            $(
                pub fn $fn_name(&mut self, $arg: $arg_ty) {
                    self.$field = $arg;
                }
            )+
        }
    };
}
