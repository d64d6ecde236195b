//! Shared utilities for tiercache procedural macros
//!
//! Parsing and validation of the `#[cache_key(...)]` attribute used by
//! `tiercache-macros`. Errors come back as ready-to-emit `compile_error!`
//! token streams.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{punctuated::Punctuated, Expr, MetaNameValue, Token, Type};

/// Parsed `#[cache_key(name = "...", value = "Type", default = expr)]` attributes
#[derive(Debug)]
pub struct CacheKeyAttributes {
    pub name: String,
    pub value_ty: Type,
    /// `None` means `Default::default()` for the value type
    pub default: Option<Expr>,
}

/// Parse a string literal attribute value
pub fn parse_str_attribute(nv: &MetaNameValue, attr: &str) -> Result<String, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            syn::Lit::Str(s) => Ok(s.value()),
            _ => {
                let msg = format!("Invalid literal for `{}`: expected string", attr);
                Err(quote! { compile_error!(#msg) })
            }
        },
        _ => {
            let msg = format!("Invalid syntax for `{}`: expected `{} = \"...\"`", attr, attr);
            Err(quote! { compile_error!(#msg) })
        }
    }
}

/// Parse the `name` attribute and validate its placeholders
pub fn parse_name_attribute(nv: &MetaNameValue) -> Result<String, TokenStream2> {
    let name = parse_str_attribute(nv, "name")?;
    validate_key_name(&name).map_err(|msg| quote! { compile_error!(#msg) })?;
    Ok(name)
}

/// Parse the `value` attribute (a type written as a string, e.g. `value = "Vec<String>"`)
pub fn parse_value_attribute(nv: &MetaNameValue) -> Result<Type, TokenStream2> {
    let raw = parse_str_attribute(nv, "value")?;
    syn::parse_str::<Type>(&raw).map_err(|e| {
        let msg = format!("Invalid type for `value`: `{}` ({})", raw, e);
        quote! { compile_error!(#msg) }
    })
}

/// Checks that a key name is non-empty and that every `${` is closed.
///
/// # Examples
///
/// ```
/// use tiercache_macro_utils::validate_key_name;
///
/// assert!(validate_key_name("ui.theme").is_ok());
/// assert!(validate_key_name("ocr/provider/${id}").is_ok());
/// assert!(validate_key_name("ocr/provider/${id").is_err());
/// assert!(validate_key_name("").is_err());
/// ```
pub fn validate_key_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("`name` must not be empty".to_string());
    }

    let mut rest = name;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => rest = &after[end + 1..],
            None => {
                return Err(format!(
                    "Unterminated placeholder in key name `{}`: expected `}}` after `${{`",
                    name
                ))
            }
        }
    }
    Ok(())
}

/// Parse cache key attributes from a token stream
pub fn parse_cache_key_attributes(attr: TokenStream2) -> Result<CacheKeyAttributes, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<MetaNameValue, Token![,]>::parse_terminated;
    let parsed_args = parser.parse2(attr).map_err(|e| {
        let msg = format!("Failed to parse attributes: {}", e);
        quote! { compile_error!(#msg) }
    })?;

    let mut name = None;
    let mut value_ty = None;
    let mut default = None;

    for nv in parsed_args {
        if nv.path.is_ident("name") {
            name = Some(parse_name_attribute(&nv)?);
        } else if nv.path.is_ident("value") {
            value_ty = Some(parse_value_attribute(&nv)?);
        } else if nv.path.is_ident("default") {
            default = Some(nv.value);
        } else {
            let msg = "Unknown attribute: expected `name`, `value` or `default`";
            return Err(quote! { compile_error!(#msg) });
        }
    }

    let name = name.ok_or_else(|| {
        quote! { compile_error!("Missing `name`: expected `name = \"...\"`") }
    })?;
    let value_ty = value_ty.ok_or_else(|| {
        quote! { compile_error!("Missing `value`: expected `value = \"Type\"`") }
    })?;

    Ok(CacheKeyAttributes {
        name,
        value_ty,
        default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: TokenStream2) -> Result<CacheKeyAttributes, String> {
        parse_cache_key_attributes(tokens).map_err(|err| err.to_string())
    }

    #[test]
    fn test_full_attribute_set() {
        let attrs = parse(quote! { name = "ui.theme", value = "String", default = "system" }).unwrap();
        assert_eq!(attrs.name, "ui.theme");
        let ty = &attrs.value_ty;
        assert_eq!(quote!(#ty).to_string(), "String");
        assert!(attrs.default.is_some());
    }

    #[test]
    fn test_default_is_optional() {
        let attrs = parse(quote! { name = "ui.zoom", value = "f64" }).unwrap();
        assert!(attrs.default.is_none());
    }

    #[test]
    fn test_attributes_debug_output() {
        let attrs = parse(quote! { name = "ui.zoom", value = "f64", default = 1.0 }).unwrap();
        let debug = format!("{:?}", attrs);
        assert!(debug.contains("CacheKeyAttributes"));
        assert!(debug.contains("ui.zoom"));
    }

    #[test]
    fn test_generic_value_type() {
        let attrs = parse(quote! { name = "recent", value = "Vec<String>" }).unwrap();
        let ty = &attrs.value_ty;
        assert_eq!(quote!(#ty).to_string(), "Vec < String >");
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let err = parse(quote! { value = "bool" }).unwrap_err();
        assert!(err.contains("compile_error"));
        assert!(err.contains("Missing `name`"));
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = parse(quote! { name = "ocr/provider/${id", value = "bool" }).unwrap_err();
        assert!(err.contains("Unterminated placeholder"));
    }

    #[test]
    fn test_unknown_attribute() {
        let err = parse(quote! { name = "a", value = "bool", ttl = 5 }).unwrap_err();
        assert!(err.contains("Unknown attribute"));
    }

    #[test]
    fn test_non_string_name() {
        let err = parse(quote! { name = 5, value = "bool" }).unwrap_err();
        assert!(err.contains("expected string"));
    }

    #[test]
    fn test_validate_multiple_placeholders() {
        assert!(validate_key_name("kb/${base}/doc/${doc}").is_ok());
        assert!(validate_key_name("kb/${base}/doc/${doc").is_err());
    }
}
