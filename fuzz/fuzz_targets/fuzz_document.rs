#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nodebuf::{DocRead, DocView, DocWrite, Error, Offset, Store};

#[derive(Arbitrary, Debug)]
enum Op {
    SetInt(u8, i64),
    SetFloat(u8, f64),
    SetStr(u8, String),
    SetBytes(u8, Vec<u8>),
    SetObj(u8),
    SetArr(u8),
    Append(i64),
    AppendStr(String),
    AppendObj,
    /// Moves the write target to one of the containers created so far.
    Focus(u8),
}

#[derive(Arbitrary, Debug)]
enum Input {
    /// Replays mutations against a fixed region and a growable store.
    Ops { size: u16, ops: Vec<Op> },
    /// Decodes arbitrary text.
    Text(Vec<u8>),
    /// Treats arbitrary bytes as an already encoded document.
    Raw(Vec<u8>),
}

fn key(k: u8) -> String {
    format!("k{}", k % 16)
}

/// Applies `op` and returns a new container offset if one was created.
fn run(doc: &mut impl DocWrite, at: Offset, op: &Op) -> Result<Option<Offset>, Error> {
    match op {
        Op::SetInt(k, v) => doc.set_i64(at, key(*k), *v).map(|()| None),
        Op::SetFloat(k, v) => doc.set_f64(at, key(*k), *v).map(|()| None),
        Op::SetStr(k, v) => doc.set_str(at, key(*k), v).map(|()| None),
        Op::SetBytes(k, v) => doc.set_bytes(at, key(*k), v).map(|()| None),
        Op::SetObj(k) => doc.set_obj(at, key(*k)).map(Some),
        Op::SetArr(k) => doc.set_arr(at, key(*k)).map(Some),
        Op::Append(v) => doc.append_i64(at, *v).map(|()| None),
        Op::AppendStr(v) => doc.append_str(at, v).map(|()| None),
        Op::AppendObj => doc.append_obj(at).map(Some),
        Op::Focus(_) => Ok(None),
    }
}

/// Reads everything reachable without panicking.
fn walk(doc: &impl DocRead) {
    let _ = doc.to_json(Offset::ROOT);
    let _ = doc.to_json_pretty(Offset::ROOT);
    let mut dst = [0u8; 64];
    let _ = doc.encode_json_into(Offset::ROOT, &mut dst);
    if let Ok(iter) = doc.iter(Offset::ROOT) {
        for entry in iter.flatten() {
            let _ = doc.value_at(entry.offset);
        }
    }
}

fn replay(size: u16, ops: &[Op]) {
    let mut region = vec![0u8; usize::from(size)];
    let mut view = DocView::new(&mut region);
    if view.init_object().is_err() {
        return;
    }
    let mut store = Store::new().expect("heap store");
    let mut view_containers = vec![Offset::ROOT];
    let mut store_containers = vec![Offset::ROOT];
    let mut focus = 0;

    for op in ops {
        if let Op::Focus(i) = op {
            focus = usize::from(*i) % view_containers.len().min(store_containers.len());
            continue;
        }
        let before = view.as_bytes().to_vec();
        match run(&mut view, view_containers[focus], op) {
            Ok(Some(ofs)) => view_containers.push(ofs),
            Ok(None) => {}
            Err(_) => assert_eq!(view.as_bytes(), &before[..], "failed write changed the view"),
        }
        match run(&mut store, store_containers[focus], op) {
            Ok(Some(ofs)) => store_containers.push(ofs),
            Ok(None) => {}
            Err(err) => assert_ne!(err, Error::NoBufferSpace, "growable store ran out of space"),
        }
    }

    walk(&view);
    walk(&store);
}

fuzz_target!(|input: Input| {
    match input {
        Input::Ops { size, ops } => replay(size, &ops),
        Input::Text(text) => {
            let mut store = Store::new().expect("heap store");
            if store.decode_json(&text).is_ok() {
                let encoded = store.to_json(Offset::ROOT).expect("decoded document encodes");
                let mut again = Store::new().expect("heap store");
                again.decode_json(&encoded).expect("encoded text decodes");
                assert_eq!(again.to_json(Offset::ROOT).as_deref(), Ok(encoded.as_str()));
            }
        }
        Input::Raw(bytes) => {
            if let Ok(store) = Store::from_encoded(&bytes) {
                walk(&store);
            }
            let mut region = bytes.clone();
            let len = region.len();
            if let Ok(view) = DocView::from_encoded(&mut region, len) {
                walk(&view);
            }
        }
    }
});
