/*
 *  Copyright (c) 2013 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

// NB: Doesn't fulfill strict weak ordering requirements.
//     Mustn't be used as an Ord implementation.
pub const fn is_newer_sequence_number(sequence_number: u16, prev_sequence_number: u16) -> bool {
    // The half-way mark for u16. Elements exactly that far apart are ordered
    // by value so that is_newer(a, b) and is_newer(b, a) are never both false.
    const BREAKPOINT: u16 = (u16::MAX >> 1) + 1;
    match sequence_number.wrapping_sub(prev_sequence_number) {
        1..BREAKPOINT => true,
        BREAKPOINT => sequence_number > prev_sequence_number,
        _ => false,
    }
}

pub const fn latest_sequence_number(sequence_number1: u16, sequence_number2: u16) -> u16 {
    if is_newer_sequence_number(sequence_number1, sequence_number2) {
        sequence_number1
    } else {
        sequence_number2
    }
}

/// Extends 16-bit wire sequence numbers into a monotonic 64-bit space.
///
/// Each value is placed at the shortest wrapping distance from the previous
/// one, so the unwrapped sequence may step backwards for reordered input.
#[derive(Debug, Default, Clone)]
pub struct SequenceNumberUnwrapper {
    last_value: Option<i64>,
}

impl SequenceNumberUnwrapper {
    pub fn unwrap(&mut self, value: u16) -> i64 {
        let unwrapped = self.peek_unwrap(value);
        self.last_value = Some(unwrapped);
        unwrapped
    }

    /// Like `unwrap` without remembering the value.
    pub fn peek_unwrap(&self, value: u16) -> i64 {
        let last = match self.last_value {
            Some(last) => last,
            None => return value as i64,
        };
        let last_wire = last as u16;
        let forward = value.wrapping_sub(last_wire) as i64;
        if is_newer_sequence_number(value, last_wire) {
            last + forward
        } else {
            let backward = last_wire.wrapping_sub(value) as i64;
            last - backward
        }
    }

    pub fn reset(&mut self) {
        self.last_value = None;
    }
}
