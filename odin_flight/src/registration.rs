/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! country of registration from tail number prefixes (ICAO nationality marks)

use lazy_static::lazy_static;

lazy_static! {
    // nationality mark -> country. Marks that are used without a dash (N, JA, HL) are listed without one
    static ref PREFIXES: Vec<(&'static str, &'static str)> = vec![
        ("N", "United States"),
        ("C-", "Canada"),
        ("XA-", "Mexico"), ("XB-", "Mexico"), ("XC-", "Mexico"),
        ("G-", "United Kingdom"),
        ("EI-", "Ireland"),
        ("F-", "France"),
        ("D-", "Germany"),
        ("OE-", "Austria"),
        ("HB-", "Switzerland"),
        ("I-", "Italy"),
        ("EC-", "Spain"),
        ("CS-", "Portugal"),
        ("PH-", "Netherlands"),
        ("OO-", "Belgium"),
        ("LX-", "Luxembourg"),
        ("OY-", "Denmark"),
        ("SE-", "Sweden"),
        ("LN-", "Norway"),
        ("OH-", "Finland"),
        ("TF-", "Iceland"),
        ("SP-", "Poland"),
        ("OK-", "Czech Republic"),
        ("HA-", "Hungary"),
        ("YR-", "Romania"),
        ("LZ-", "Bulgaria"),
        ("SX-", "Greece"),
        ("9H-", "Malta"),
        ("TC-", "Turkey"),
        ("RA-", "Russia"),
        ("UR-", "Ukraine"),
        ("4X-", "Israel"),
        ("A6-", "United Arab Emirates"),
        ("A7-", "Qatar"),
        ("HZ-", "Saudi Arabia"),
        ("SU-", "Egypt"),
        ("ZS-", "South Africa"),
        ("5Y-", "Kenya"),
        ("ET-", "Ethiopia"),
        ("VT-", "India"),
        ("AP-", "Pakistan"),
        ("9V-", "Singapore"),
        ("9M-", "Malaysia"),
        ("HS-", "Thailand"),
        ("PK-", "Indonesia"),
        ("RP-", "Philippines"),
        ("VN-", "Vietnam"),
        ("B-", "China"),
        ("JA", "Japan"),
        ("HL", "South Korea"),
        ("VH-", "Australia"),
        ("ZK-", "New Zealand"),
        ("PP-", "Brazil"), ("PR-", "Brazil"), ("PS-", "Brazil"), ("PT-", "Brazil"), ("PU-", "Brazil"),
        ("LV-", "Argentina"),
        ("CC-", "Chile"),
        ("HK-", "Colombia"),
        ("OB-", "Peru"),
    ];
}

/// longest matching nationality mark wins ("HB-" over "H..", "XA-" over "X..")
pub fn country_for_registration (registration: &str)->Option<&'static str> {
    let reg = registration.trim().to_uppercase();
    if reg.is_empty() { return None }

    PREFIXES.iter()
        .filter( |(prefix,_)| matches_prefix( &reg, prefix))
        .max_by_key( |(prefix,_)| prefix.len())
        .map( |(_,country)| *country)
}

fn matches_prefix (reg: &str, prefix: &str)->bool {
    if !reg.starts_with( prefix) { return false }

    if prefix.ends_with('-') {
        true
    } else {
        // dashless marks are followed by the numeric part of the registration (N123AB, JA801A, HL7611)
        reg[prefix.len()..].chars().next().is_some_and( |c| c.is_ascii_digit())
    }
}
