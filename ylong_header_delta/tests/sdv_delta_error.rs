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

use ylong_header_delta::{
    CodecConfig, CodecError, DeltaDecoder, DeltaEncoder, FrameCodec, FramingError, HeaderSet,
};

fn pair() -> (DeltaEncoder, DeltaDecoder) {
    let config = CodecConfig::default();
    (
        DeltaEncoder::new(config.clone()).unwrap(),
        DeltaDecoder::new(config).unwrap(),
    )
}

fn sample() -> HeaderSet {
    [
        (":method", "get"),
        (":path", "/index.html"),
        ("host", "www.example.com"),
        ("accept-language", "en-US,en;q=0.5"),
    ]
    .into_iter()
    .collect()
}

/// SDV test cases for malformed frames.
///
/// # Brief
/// 1. Decodes messages with a broken frame header or broken framing.
/// 2. Checks the framing errors.
/// 3. Checks that the decoder still decodes a valid message afterwards.
#[test]
fn sdv_delta_error_framing() {
    let (mut encoder, mut decoder) = pair();
    let good = encoder.encode(&sample(), 1).unwrap();

    let mut cases = Vec::new();
    cases.push((Vec::new(), "truncated"));
    cases.push((good[..4].to_vec(), "truncated"));
    cases.push((good[..good.len() - 2].to_vec(), "truncated"));
    let mut bad = good.clone();
    bad[3] &= 0x7f;
    cases.push((bad, "control"));
    let mut bad = good.clone();
    bad[7] = 0x01;
    cases.push((bad, "type"));
    let mut bad = good.clone();
    bad.extend_from_slice(&[0, 0]);
    cases.push((bad, "trailing"));

    for (bytes, kind) in cases {
        let err = decoder.decode(&bytes).unwrap_err();
        let matched = match (&err, kind) {
            (CodecError::DecodeFraming(FramingError::Truncated { .. }), "truncated") => true,
            (CodecError::DecodeFraming(FramingError::MissingControlBit(_)), "control") => true,
            (CodecError::DecodeFraming(FramingError::UnknownFrameType(0x01)), "type") => true,
            (CodecError::DecodeFraming(FramingError::TrailingBytes(2)), "trailing") => true,
            _ => false,
        };
        assert!(matched, "{kind}: {err:?}");
        assert!(err.is_decode_error());
        assert_eq!(err.category(), "framing");
    }

    assert_eq!(decoder.decode(&good).unwrap(), sample());
}

/// SDV test cases for malformed payloads.
///
/// # Brief
/// 1. Frames payloads with an unknown opcode and with leftover bytes.
/// 2. Checks the framing errors.
#[test]
fn sdv_delta_error_payload() {
    let (_, mut decoder) = pair();
    let frames = FrameCodec::new(true);

    let bytes = frames.encode(&[0x09, 0x00, 0x00, 0x02], 1, 0);
    assert_eq!(
        decoder.decode(&bytes),
        Err(CodecError::DecodeFraming(FramingError::UnknownOpcode(0x09)))
    );

    let bytes = frames.encode(&[0x01, 0x00, 0x00, 0x02, 0x00], 1, 0);
    assert_eq!(
        decoder.decode(&bytes),
        Err(CodecError::DecodeFraming(FramingError::LengthMismatch {
            leftover: 8
        }))
    );

    let bytes = frames.encode(&[0x01, 0x00, 0x00, 0x02], 1, 0);
    assert_eq!(decoder.decode(&bytes).unwrap().get(":method"), Some("get"));
}

/// SDV test cases for corrupted Huffman strings.
///
/// # Brief
/// 1. Frames a store whose key is a run of one bits.
/// 2. Checks that decoding fails with a Huffman error.
#[test]
fn sdv_delta_error_huffman() {
    let (_, mut decoder) = pair();
    let frames = FrameCodec::new(true);
    let bytes = frames.encode(&[0x04, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff], 1, 0);
    let err = decoder.decode(&bytes).unwrap_err();
    assert!(matches!(err, CodecError::HuffmanDecode(_)), "{err:?}");
    assert!(decoder.state().table().is_empty());
}

/// SDV test cases for a decoder that missed a message.
///
/// # Brief
/// 1. Encodes three messages and drops the first one.
/// 2. Checks that the decoder reports the divergence instead of guessing.
#[test]
fn sdv_delta_error_desync() {
    let (mut encoder, mut decoder) = pair();
    let first = [("x-a", "1"), ("x-b", "2")]
        .into_iter()
        .collect::<HeaderSet>();
    let _lost = encoder.encode(&first, 0).unwrap();
    let _lost = encoder.encode(&HeaderSet::new(), 0).unwrap();
    let bytes = encoder.encode(&first, 0).unwrap();

    let err = decoder.decode(&bytes).unwrap_err();
    assert!(matches!(err, CodecError::StateDesync { .. }));
    assert_eq!(err.category(), "desync");
    assert!(decoder.state().active(0).is_empty());
}

/// SDV test cases for encoder field overflows.
///
/// # Brief
/// 1. Uses 8 bit string length fields with raw strings.
/// 2. Encodes a value longer than 255 bytes.
/// 3. Checks the error and that the encoder state is untouched.
#[test]
fn sdv_delta_error_field_overflow() {
    let config = CodecConfig::builder()
        .string_coding(ylong_header_delta::StringCoding {
            length_bits: 8,
            eof: false,
            huffman: false,
            pad: true,
        })
        .build()
        .unwrap();
    let mut encoder = DeltaEncoder::new(config).unwrap();
    let long = "v".repeat(300);
    let input = [("x-long", long.as_str())]
        .into_iter()
        .collect::<HeaderSet>();
    assert_eq!(
        encoder.encode(&input, 0),
        Err(CodecError::FieldOverflow {
            field: "string length",
            value: 300,
            bits: 8,
        })
    );
    assert!(encoder.state().table().is_empty());
}
