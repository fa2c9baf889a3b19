//! Fixed-arity fast-fail joins producing tuples.
//!
//! `parN` starts its N tasks concurrently and succeeds with their values as a
//! tuple. The first member to fail fails the join with its error and the
//! members still pending are cancelled. The [`par!`](crate::par!) macro picks
//! the right function from the number of arguments.

use super::join::{JoinMode, fan_in};
use crate::promise::Value;
use crate::task::Task;

macro_rules! tuple_par {
    ($($name:ident => ($($ty:ident $task:ident),+);)+) => {
        $(
            #[doc = concat!(
                "Joins ", stringify!($($task),+),
                " into a tuple, failing fast on the first error."
            )]
            pub fn $name<$($ty: Value),+>($($task: Task<$ty>),+) -> Task<($($ty,)+)> {
                let members = vec![$($task.core()),+];

                fan_in(stringify!($name), members, JoinMode::FastFail, move || {
                    Ok(($($task.get()?,)+))
                })
            }
        )+
    };
}

tuple_par! {
    par2 => (T1 t1, T2 t2);
    par3 => (T1 t1, T2 t2, T3 t3);
    par4 => (T1 t1, T2 t2, T3 t3, T4 t4);
    par5 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5);
    par6 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6);
    par7 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7);
    par8 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8);
    par9 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9);
    par10 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9, T10 t10);
    par11 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9, T10 t10, T11 t11);
    par12 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9, T10 t10, T11 t11, T12 t12);
    par13 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9, T10 t10, T11 t11, T12 t12, T13 t13);
    par14 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9, T10 t10, T11 t11, T12 t12, T13 t13, T14 t14);
    par15 => (T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8, T9 t9, T10 t10, T11 t11, T12 t12, T13 t13, T14 t14, T15 t15);
}
