#![allow(non_snake_case)]

mod dispatcher;
mod sync_worker;
