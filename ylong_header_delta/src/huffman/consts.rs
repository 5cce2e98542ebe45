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

//! Symbol frequencies measured over captured request and response headers.
//! Bytes that never occurred are absent and count as weight 1.

/// Byte frequencies of request header strings.
#[rustfmt::skip]
pub(crate) const REQUEST_FREQUENCIES: &[(u8, u64)] = &[
    (b'e', 3447), (b'/', 3366), (b'a', 3281), (b's', 3133), (b'2', 3072),
    (b't', 2752), (b'1', 2743), (b'n', 2526), (b'i', 2488), (b'0', 2419),
    (b'3', 2358), (b'c', 2353), (b'o', 2349), (b'.', 2212), (b'p', 2016),
    (b'r', 2003), (b'm', 1980), (b'g', 1917), (b'4', 1845), (b'6', 1796),
    (b'=', 1692), (b'8', 1585), (b'l', 1571), (b'd', 1564), (b'5', 1528),
    (b'9', 1453), (b'7', 1448), (b'_', 1442), (b'&', 1293), (b'%', 1273),
    (b'-', 1222), (b'b', 1184), (b'h', 988), (b'u', 974), (b',', 875),
    (b'f', 802), (b'j', 792), (b'A', 771), (b'w', 764), (b'v', 763),
    (b'F', 709), (b'D', 651), (b'y', 586), (b'x', 564), (b'k', 529),
    (b'I', 489), (b'G', 462), (b'C', 399), (b'S', 396), (b'z', 358),
    (b'V', 355), (b'B', 354), (b'U', 351), (b'T', 339), (b'L', 329),
    (b'R', 315), (b'E', 314), (b'P', 313), (b'q', 312), (b'N', 306),
    (b'M', 269), (b'Z', 257), (b'Y', 251), (b'X', 250), (b'H', 246),
    (b'Q', 244), (b'W', 243), (b'?', 222), (b'J', 212), (b'O', 210),
    (b'K', 207), (b':', 147), (b';', 122), (b' ', 28), (b'!', 27), (b'(', 23),
    (b')', 23), (b'*', 18), (b'+', 15), (b'{', 11), (b'}', 11), (b'~', 4),
    (b'$', 2), (b'\'', 2), (b'[', 2), (b']', 2),
];

/// Frequency of the end-of-string symbol in request headers.
pub(crate) const REQUEST_EOF_FREQUENCY: u64 = 1029;

/// Byte frequencies of response header strings.
#[rustfmt::skip]
pub(crate) const RESPONSE_FREQUENCIES: &[(u8, u64)] = &[
    (b' ', 6174), (b'2', 5697), (b'1', 5419), (b'0', 5023), (b'3', 3138),
    (b'4', 2973), (b'e', 2931), (b'5', 2624), (b'a', 2619), (b'8', 2577),
    (b'6', 2440), (b'9', 2371), (b'7', 2361), (b':', 2303), (b'c', 2209),
    (b'u', 2005), (b'd', 2001), (b'T', 1991), (b'M', 1849), (b'n', 1770),
    (b'o', 1751), (b'b', 1608), (b't', 1564), (b'G', 1515), (b'i', 1458),
    (b',', 1437), (b'r', 1405), (b'A', 1387), (b'g', 1352), (b'f', 1343),
    (b'l', 1189), (b'=', 1147), (b'F', 1136), (b'p', 1109), (b's', 1087),
    (b'm', 1050), (b'C', 998), (b'/', 975), (b'-', 928), (b'D', 919),
    (b'E', 835), (b'h', 834), (b'x', 825), (b'S', 815), (b'J', 781),
    (b'B', 738), (b'w', 669), (b'.', 648), (b'v', 641), (b'O', 633),
    (b'W', 622), (b'y', 617), (b'"', 580), (b'P', 561), (b'N', 557),
    (b'U', 554), (b'k', 549), (b'I', 543), (b'j', 526), (b'R', 508),
    (b'L', 492), (b'Z', 488), (b'V', 482), (b'K', 478), (b'z', 478),
    (b'Q', 476), (b'Y', 476), (b'q', 463), (b'X', 454), (b'H', 446),
    (b';', 278), (b'+', 276), (b'_', 270), (b'(', 156), (b')', 156),
    (b'&', 136), (b'%', 123), (0x00, 53), (b'?', 16), (b'|', 11), (b'#', 9),
    (b'{', 4), (b'}', 4), (b'*', 2), (b'[', 2), (b']', 2), (b'!', 1),
];

/// Frequency of the end-of-string symbol in response headers.
pub(crate) const RESPONSE_EOF_FREQUENCY: u64 = 3416;
