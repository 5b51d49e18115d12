//-
// Copyright (c) 2016, Jason Lingle
//
// This file is part of PGPWrap.
//
// PGPWrap is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// PGPWrap is distributed  in the hope that  it will be useful,  but WITHOUT
// ANY WARRANTY; without even the implied  warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// PGPWrap. If not, see <http://www.gnu.org/licenses/>.

//! Rules for carrying headers from one entity onto another.

use crate::mime::Headers;

/// Appends to `target` every header of `source` whose name `target` does not
/// already have.
///
/// Headers already on `target` are never altered or reordered. Whether a name
/// is "already present" is decided against `target` as it was on entry, so
/// all occurrences of a repeated source header (eg, `Received`) are carried
/// over in source order.
pub fn copy_headers(source: &Headers, target: &mut Headers) {
    let existing = target.clone();
    for header in source {
        if !existing.contains(&header.name) {
            target.append(header.name.clone(), header.value.clone());
        }
    }
}
