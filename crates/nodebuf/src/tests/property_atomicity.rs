use std::collections::BTreeMap;

use quickcheck::{Arbitrary, Gen, QuickCheck};

use crate::{DocRead, DocView, DocWrite, Error, Offset, OwnedValue, Result, Store};

#[derive(Debug, Clone)]
enum Op {
    Int(u8, i64),
    Str(u8, String),
    Bytes(u8, Vec<u8>),
    Null(u8),
    Push(i64),
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        let key = u8::arbitrary(g) % 8;
        match u8::arbitrary(g) % 5 {
            0 => Op::Int(key, i64::arbitrary(g)),
            1 => Op::Str(key, String::arbitrary(g)),
            2 => Op::Bytes(key, Vec::arbitrary(g)),
            3 => Op::Null(key),
            _ => Op::Push(i64::arbitrary(g)),
        }
    }
}

fn key(k: u8) -> String {
    format!("k{k}")
}

fn run(doc: &mut impl DocWrite, list: Offset, op: &Op) -> Result<()> {
    match op {
        Op::Int(k, v) => doc.set_i64(Offset::ROOT, key(*k), *v),
        Op::Str(k, v) => doc.set_str(Offset::ROOT, key(*k), v),
        Op::Bytes(k, v) => doc.set_bytes(Offset::ROOT, key(*k), v),
        Op::Null(k) => doc.set_null(Offset::ROOT, key(*k)),
        Op::Push(v) => doc.append_i64(list, *v),
    }
}

/// What the document should contain after the successful operations.
#[derive(Default)]
struct Model {
    members: BTreeMap<String, OwnedValue>,
    list: Vec<i64>,
}

impl Model {
    fn record(&mut self, op: &Op) {
        let (k, v) = match op {
            Op::Int(k, v) => (k, OwnedValue::Int(*v)),
            Op::Str(k, v) => (k, OwnedValue::String(v.clone())),
            Op::Bytes(k, v) => (k, OwnedValue::Bytes(v.clone())),
            Op::Null(k) => (k, OwnedValue::Null),
            Op::Push(v) => {
                self.list.push(*v);
                return;
            }
        };
        self.members.insert(key(*k), v);
    }

    fn matches(&self, doc: &impl DocRead, list: Offset) -> bool {
        let members_ok = self.members.iter().all(|(k, v)| {
            doc.get_value(Offset::ROOT, k).map(|found| found.into_owned()).as_ref() == Ok(v)
        });
        let list_ok = self
            .list
            .iter()
            .zip(0u32..)
            .all(|(v, i)| doc.arr_get_i64(list, i) == Ok(*v));
        members_ok
            && list_ok
            && doc.count(Offset::ROOT) == Ok(self.members.len() as u32 + 1)
            && doc.count(list) == Ok(self.list.len() as u32)
    }
}

/// Property: a fixed view either applies an operation or rejects it with
/// `NoBufferSpace` and is left byte-for-byte unchanged; a growable store
/// applies every operation.
#[test]
fn failed_writes_change_nothing_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(ops: Vec<Op>, size: u16) -> bool {
        let mut region = vec![0u8; 64 + usize::from(size % 1024)];
        let mut view = DocView::new(&mut region);
        view.init_object().unwrap();
        let view_list = view.set_arr(Offset::ROOT, "list").unwrap();
        let mut view_model = Model::default();

        let mut store = Store::new().unwrap();
        let store_list = store.set_arr(Offset::ROOT, "list").unwrap();
        let mut store_model = Model::default();

        for op in &ops {
            let before = view.as_bytes().to_vec();
            match run(&mut view, view_list, op) {
                Ok(()) => view_model.record(op),
                Err(Error::NoBufferSpace) => {
                    if view.as_bytes() != &before[..] {
                        return false;
                    }
                }
                Err(_) => return false,
            }

            if run(&mut store, store_list, op).is_err() {
                return false;
            }
            store_model.record(op);
        }

        view_model.matches(&view, view_list) && store_model.matches(&store, store_list)
    }

    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;

    QuickCheck::new()
        .tests(tests)
        .quickcheck(prop as fn(Vec<Op>, u16) -> bool);
}
