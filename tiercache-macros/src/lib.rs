use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Expr, Fields, ItemStruct};

// Import shared utilities
use tiercache_macro_utils::{parse_cache_key_attributes, CacheKeyAttributes};

/// Generate the body of `default_value()`
///
/// String literals go through `From::from` so `default = "system"` works for
/// `String` (and any other type built from `&str`); every other expression is
/// used as written.
fn generate_default_expr(default: Option<&Expr>) -> TokenStream2 {
    match default {
        Some(Expr::Lit(expr_lit)) if matches!(expr_lit.lit, syn::Lit::Str(_)) => {
            quote! { ::core::convert::From::from(#expr_lit) }
        }
        Some(expr) => quote! { #expr },
        None => quote! { ::core::default::Default::default() },
    }
}

/// Declares a unit struct as a static schema key.
///
/// The struct gets an implementation of `tiercache_core::StaticKey`, which
/// makes it usable with the typed tier operations (`get::<K>()`,
/// `set::<K>(..)`, `get_persist::<K>()`, ...) and with
/// `Schema::builder().key::<K>()`.
///
/// The generated code names `::tiercache_core`, so the calling crate needs
/// `tiercache-core` as a direct dependency.
///
/// # Macro Parameters
///
/// - `name` (required): The key string. May contain `${param}` placeholders,
///   making the struct a template key for a family of concrete keys.
/// - `value` (required): The value type, written as a string
///   (`value = "Vec<String>"`). Must implement `Serialize`,
///   `DeserializeOwned` and `Clone`.
/// - `default` (optional): Expression for the default value. A string literal
///   is converted with `From::from`. Default: `Default::default()`.
///
/// # Errors
///
/// Emits `compile_error!` for a missing `name` or `value`, an unknown
/// parameter, an unparsable type, a placeholder without its closing `}`, or
/// an item that is not a unit struct.
///
/// # Examples
///
/// ```ignore
/// use tiercache::{cache_key, CacheContext, CacheTier, Schema};
///
/// #[cache_key(name = "ui.theme", value = "String", default = "system")]
/// pub struct Theme;
///
/// #[cache_key(name = "ocr/provider/${id}", value = "bool", default = false)]
/// pub struct OcrProviderEnabled;
///
/// let ctx = CacheContext::builder()
///     .schema(Schema::builder().key::<Theme>().key::<OcrProviderEnabled>().build())
///     .build();
///
/// assert_eq!(ctx.local().get::<Theme>(), "system");
/// ctx.local().set_instance::<OcrProviderEnabled>(&["system"], true, None);
/// ```
#[proc_macro_attribute]
pub fn cache_key(attr: TokenStream, item: TokenStream) -> TokenStream {
    // Parse macro attributes
    let attrs = match parse_cache_key_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return TokenStream::from(err),
    };

    // Parse struct
    let input = parse_macro_input!(item as ItemStruct);
    if !matches!(input.fields, Fields::Unit) || !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.ident,
            "#[cache_key] expects a unit struct without generics, e.g. `pub struct Theme;`",
        )
        .to_compile_error()
        .into();
    }

    TokenStream::from(expand_static_key(&input, &attrs))
}

fn expand_static_key(input: &ItemStruct, attrs: &CacheKeyAttributes) -> TokenStream2 {
    let ident = &input.ident;
    let name = &attrs.name;
    let value_ty = &attrs.value_ty;
    let default_expr = generate_default_expr(attrs.default.as_ref());

    quote! {
        #input

        impl ::tiercache_core::StaticKey for #ident {
            const NAME: &'static str = #name;
            type Value = #value_ty;

            fn default_value() -> Self::Value {
                #default_expr
            }
        }
    }
}
