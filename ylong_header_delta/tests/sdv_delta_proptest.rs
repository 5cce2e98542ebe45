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

use proptest::prelude::*;
use ylong_header_delta::{
    BitBuffer, CodecConfig, DeltaDecoder, DeltaEncoder, HeaderSet, HuffmanCoder,
};

const NAMES: &[&str] = &[
    ":method",
    ":path",
    "accept",
    "cookie",
    "host",
    "referer",
    "via",
    "x-request-id",
    "x-trace",
];

fn config_strategy() -> impl Strategy<Value = CodecConfig> {
    prop_oneof![
        Just(CodecConfig::default()),
        Just(CodecConfig::compact()),
        Just(CodecConfig::byte_aligned()),
        (32usize..256, 1usize..8).prop_map(|(max_bytes, max_entries)| {
            CodecConfig::builder()
                .max_bytes(max_bytes)
                .max_entries(max_entries)
                .varint_indices(true)
                .build()
                .unwrap()
        }),
    ]
}

fn roomy_config_strategy() -> impl Strategy<Value = CodecConfig> {
    prop_oneof![
        Just(CodecConfig::default()),
        Just(CodecConfig::compact()),
        Just(CodecConfig::byte_aligned()),
    ]
}

fn headers_strategy() -> impl Strategy<Value = HeaderSet> {
    prop::collection::vec(
        (prop::sample::select(NAMES), "[a-z0-9/=.]{1,12}"),
        0..10,
    )
    .prop_map(|fields| fields.into_iter().collect::<HeaderSet>())
}

fn messages_strategy() -> impl Strategy<Value = Vec<(u8, HeaderSet)>> {
    prop::collection::vec((0u8..3, headers_strategy()), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_delta_round_trip(config in config_strategy(), messages in messages_strategy()) {
        let mut encoder = DeltaEncoder::new(config.clone()).unwrap();
        let mut decoder = DeltaDecoder::new(config).unwrap();
        for (group, input) in messages {
            let bytes = encoder.encode(&input, group).unwrap();
            let output = decoder.decode(&bytes).unwrap();
            prop_assert_eq!(input.mismatch(&output), None);
            prop_assert_eq!(encoder.state().active(group), decoder.state().active(group));
        }
    }

    #[test]
    fn prop_delta_table_invariants(config in config_strategy(), messages in messages_strategy()) {
        let mut encoder = DeltaEncoder::new(config.clone()).unwrap();
        for (group, input) in messages {
            encoder.encode(&input, group).unwrap();
            let state = encoder.state();
            let table = state.table();
            prop_assert!(table.current_size() <= config.max_bytes);
            prop_assert!(table.len() <= config.max_entries);
            prop_assert_eq!(
                table.dynamic_entries().map(|entry| entry.size()).sum::<usize>(),
                table.current_size()
            );
            for header_group in state.groups().iter() {
                prop_assert!(header_group.active().iter().all(|seq| table.contains(*seq)));
            }
        }
    }

    #[test]
    fn prop_delta_idempotent(config in roomy_config_strategy(), input in headers_strategy()) {
        let mut encoder = DeltaEncoder::new(config).unwrap();
        encoder.encode(&input, 0).unwrap();
        let size = encoder.state().table().current_size();
        let active = encoder.state().active(0);
        let ops = encoder.plan(&input, 0).unwrap();
        prop_assert!(
            ops.iter().all(|op| matches!(op, ylong_header_delta::Operation::EphemeralRef { .. })),
            "{:?}",
            ops
        );
        encoder.encode(&input, 0).unwrap();
        prop_assert_eq!(encoder.state().table().current_size(), size);
        prop_assert_eq!(encoder.state().active(0), active);
    }

    #[test]
    fn prop_huffman_round_trip(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        for coder in [HuffmanCoder::request(), HuffmanCoder::response()] {
            let mut buf = coder.encode(&bytes, true);
            buf.write_bits(0b101, 3);
            prop_assert_eq!(coder.decode(&mut buf, true, None).unwrap(), bytes.clone());
            prop_assert_eq!(buf.read_bits(3).unwrap(), 0b101);

            let bits = coder.encoded_bits(&bytes, false);
            let mut buf = BitBuffer::new();
            coder.encode_into(&bytes, false, &mut buf);
            prop_assert_eq!(buf.bit_length(), bits);
            prop_assert_eq!(coder.decode(&mut buf, false, Some(bits)).unwrap(), bytes.clone());
        }
    }
}
