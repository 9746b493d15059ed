//! Default Spanish/English vocabulary.
//!
//! Verb forms collapse onto one infinitive per action and a few common
//! nouns onto their catalog spelling, so `"borra la orden"` and
//! `"borrar orden"` meet in the same canonical vocabulary.

use crate::lexicon::Lexicon;

const ES_SEED: &[(&str, &str)] = &[
    ("abre", "abrir"),
    ("abra", "abrir"),
    ("cierra", "cerrar"),
    ("cierre", "cerrar"),
    ("borra", "eliminar"),
    ("borre", "eliminar"),
    ("borrar", "eliminar"),
    ("elimina", "eliminar"),
    ("elimine", "eliminar"),
    ("quita", "eliminar"),
    ("quitar", "eliminar"),
    ("muestra", "mostrar"),
    ("muestre", "mostrar"),
    ("enseña", "mostrar"),
    ("busca", "buscar"),
    ("busque", "buscar"),
    ("crea", "crear"),
    ("cree", "crear"),
    ("agrega", "crear"),
    ("agregar", "crear"),
    ("añade", "crear"),
    ("añadir", "crear"),
    ("filtra", "filtrar"),
    ("activa", "activar"),
    ("enciende", "activar"),
    ("encender", "activar"),
    ("desactiva", "desactivar"),
    ("apaga", "desactivar"),
    ("apagar", "desactivar"),
    ("programa", "programar"),
    ("pedido", "orden"),
    ("pedidos", "órdenes"),
];

const EN_SEED: &[(&str, &str)] = &[
    ("opens", "open"),
    ("display", "show"),
    ("remove", "delete"),
    ("erase", "delete"),
    ("add", "create"),
    ("new", "create"),
    ("find", "search"),
    ("look", "search"),
    ("hide", "close"),
    ("activate", "enable"),
    ("deactivate", "disable"),
    ("purchase", "order"),
    ("purchases", "orders"),
];

/// Install the default seed vocabulary under the `es` and `en` base tags.
///
/// Locale-specific tags (`es-CR`) still resolve through base-tag fallback,
/// and entries registered later under a full tag take precedence.
pub fn seed_lexicon(lexicon: &Lexicon) {
    lexicon.bulk_register("es", ES_SEED.iter().copied());
    lexicon.bulk_register("en", EN_SEED.iter().copied());
}
