//! Static registry of the geographic targets a sweep can cover.

use crate::models::GeoTarget;

const fn target(region: &'static str, town: &'static str, postal_code: &'static str) -> GeoTarget {
    GeoTarget {
        region,
        town,
        postal_code,
    }
}

/// One principal town per Swedish county
pub const TARGETS: [GeoTarget; 21] = [
    target("Stockholm län", "Stockholm", "11121"),
    target("Uppsala län", "Uppsala", "75310"),
    target("Södermanlands län", "Nyköping", "61131"),
    target("Östergötlands län", "Linköping", "58222"),
    target("Jönköpings län", "Jönköping", "55315"),
    target("Kronobergs län", "Växjö", "35222"),
    target("Kalmar län", "Kalmar", "39231"),
    target("Gotlands län", "Visby", "62157"),
    target("Blekinge län", "Karlskrona", "37131"),
    target("Skåne län", "Malmö", "21122"),
    target("Hallands län", "Halmstad", "30243"),
    target("Västra Götalands län", "Göteborg", "41103"),
    target("Värmlands län", "Karlstad", "65224"),
    target("Örebro län", "Örebro", "70210"),
    target("Västmanlands län", "Västerås", "72211"),
    target("Dalarnas län", "Falun", "79171"),
    target("Gävleborgs län", "Gävle", "80320"),
    target("Västernorrlands län", "Härnösand", "87131"),
    target("Jämtlands län", "Östersund", "83131"),
    target("Västerbottens län", "Umeå", "90327"),
    target("Norrbottens län", "Luleå", "97231"),
];

pub fn get(index: usize) -> Option<GeoTarget> {
    TARGETS.get(index).copied()
}
