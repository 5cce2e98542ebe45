// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cell::RefCell;
use std::rc::Rc;

use ylong_header_delta::{
    CodecConfig, CodecError, DeltaDecoder, DeltaEncoder, HeaderSet, HeaderTable, Operation,
};

/// SDV test cases for oldest-first eviction.
///
/// # Brief
/// 1. Creates a table of 64 bytes and 4 entries.
/// 2. Inserts five entries while recording evictions.
/// 3. Checks that only the first entry was evicted and no longer resolves.
#[test]
fn sdv_delta_table_eviction() {
    let mut table = HeaderTable::with_limits(64, 4, 1 << 16).unwrap();
    let evicted = Rc::new(RefCell::new(Vec::new()));
    let observer = evicted.clone();
    table.subscribe_eviction(move |seq| observer.borrow_mut().push(seq));

    let seqs = (1..=5)
        .map(|i| table.insert(format!("k{i}"), format!("v{i}")).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(*evicted.borrow(), vec![seqs[0]]);
    assert!(table.lookup(seqs[0]).is_none());
    assert!(table.find("k1", "v1").exact_index.is_none());
    assert_eq!(table.len(), 4);
    assert_eq!(table.current_size(), 16);
    for (i, seq) in seqs.iter().enumerate().skip(1) {
        let entry = table.lookup(*seq).unwrap();
        assert_eq!(entry.key(), format!("k{}", i + 1));
        assert_eq!(entry.value(), format!("v{}", i + 1));
    }
}

/// SDV test cases for sequence number wrap-around.
///
/// # Brief
/// 1. Creates a table whose numbering wraps after five dynamic numbers.
/// 2. Inserts many entries.
/// 3. Checks that numbers wrap to the first dynamic number and still
///    resolve.
#[test]
fn sdv_delta_table_sequence_wrap() {
    let static_count = HeaderTable::with_limits(64, 2, 70).unwrap().static_count() as u32;
    let mut table = HeaderTable::with_limits(1024, 2, static_count + 5).unwrap();

    let mut seqs = Vec::new();
    for i in 0..12 {
        let seq = table.insert("x-n", i.to_string()).unwrap();
        assert!(seq >= static_count && seq < static_count + 5);
        seqs.push(seq);
    }
    assert_eq!(seqs[5], static_count);
    assert_eq!(table.lookup(seqs[11]).unwrap().value(), "11");
    assert_eq!(table.lookup(seqs[10]).unwrap().value(), "10");
    assert!(table.lookup(seqs[9]).is_none());
    assert_eq!(table.find("x-n", "10").exact_index, Some(seqs[10]));
}

/// SDV test cases for the eviction bounds across encoded messages.
///
/// # Brief
/// 1. Encodes header sets of growing size through a small table.
/// 2. Checks the table bounds after every message.
#[test]
fn sdv_delta_table_bounds() {
    let config = CodecConfig::builder()
        .max_bytes(100)
        .max_entries(5)
        .build()
        .unwrap();
    let mut encoder = DeltaEncoder::new(config.clone()).unwrap();
    let mut decoder = DeltaDecoder::new(config).unwrap();
    for n in 0..20 {
        let input = (0..n)
            .map(|i| (format!("x-h{}", i % 7), format!("value-{}", n * i)))
            .collect::<HeaderSet>();
        let bytes = encoder.encode(&input, (n % 3) as u8).unwrap();
        assert_eq!(decoder.decode(&bytes).unwrap(), input);
        for state in [encoder.state(), decoder.state()] {
            let table = state.table();
            assert!(table.current_size() <= 100);
            assert!(table.len() <= 5);
            for group in state.groups().iter() {
                assert!(group.active().iter().all(|seq| table.contains(*seq)));
            }
        }
    }
}

/// SDV test cases for capacity failures.
///
/// # Brief
/// 1. Encodes a header set with a field larger than the table twice.
/// 2. Checks that both attempts fail the same way without changing the
///    encoder.
/// 3. Checks that encoding continues in sync with the decoder.
#[test]
fn sdv_delta_table_capacity_determinism() {
    let config = CodecConfig::builder().max_bytes(64).build().unwrap();
    let mut encoder = DeltaEncoder::new(config.clone()).unwrap();
    let mut decoder = DeltaDecoder::new(config).unwrap();

    let first = [("accept", "*/*"), ("x-id", "1")]
        .into_iter()
        .collect::<HeaderSet>();
    let bytes = encoder.encode(&first, 0).unwrap();
    assert_eq!(decoder.decode(&bytes).unwrap(), first);
    let size = encoder.state().table().current_size();
    let active = encoder.state().active(0);

    let big = "z".repeat(100);
    let oversized = [("accept", "*/*"), ("x-big", big.as_str())]
        .into_iter()
        .collect::<HeaderSet>();
    let errors = (0..2)
        .map(|_| encoder.encode(&oversized, 0).unwrap_err())
        .collect::<Vec<_>>();
    assert_eq!(errors[0], errors[1]);
    assert_eq!(
        errors[0],
        CodecError::CapacityExceeded {
            size: 105,
            max_bytes: 64,
            max_entries: 1024,
        }
    );
    assert_eq!(encoder.state().table().current_size(), size);
    assert_eq!(encoder.state().active(0), active);

    let bytes = encoder.encode(&first, 0).unwrap();
    assert_eq!(decoder.decode(&bytes).unwrap(), first);
    assert_eq!(encoder.state().active(0), decoder.state().active(0));
}

/// SDV test cases for the request scenario with a static, a stored and an
/// ephemeral field.
///
/// # Brief
/// 1. Plans and encodes two requests that differ only in `:path`.
/// 2. Checks the planned operations of each.
#[test]
fn sdv_delta_table_request_scenario() {
    let mut encoder = DeltaEncoder::new(CodecConfig::default()).unwrap();
    let first = [(":method", "get"), (":path", "/a"), ("host", "example.com")]
        .into_iter()
        .collect::<HeaderSet>();
    let second = [(":method", "get"), (":path", "/b"), ("host", "example.com")]
        .into_iter()
        .collect::<HeaderSet>();

    let ops = encoder.plan(&first, 0).unwrap();
    assert!(ops.contains(&Operation::EphemeralRef {
        key: ":path".to_string(),
        value: "/a".to_string()
    }));
    encoder.encode(&first, 0).unwrap();

    assert_eq!(
        encoder.plan(&second, 0).unwrap(),
        vec![Operation::EphemeralRef {
            key: ":path".to_string(),
            value: "/b".to_string()
        }]
    );
}
