pub use enclose::*;

#[macro_export]
macro_rules! derived {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::Derived::new($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    ($($b:tt)*) => {
        $crate::Derived::new(move || { $($b)* })
    };
}

#[macro_export]
macro_rules! autorun {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::autorun($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    ($($b:tt)*) => {
        $crate::autorun(move || { $($b)* })
    };
}
