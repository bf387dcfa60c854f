use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Field, Fields, Generics, LitStr, Path, TypeParamBound,
    parse_macro_input,
};

/// Derive `rowmap::Mappable`.
///
/// On a struct with named fields every field becomes a property. By default
/// the all-fields constructor is declared too, so rows decode as positional
/// records. With `#[rowmap(default)]` on the struct, `Default::default` is
/// declared instead and fields are assigned one by one.
///
/// Field attributes:
///
/// - `#[rowmap(rename = "col")]`: column name to match instead of the field name.
/// - `#[rowmap(default = "path::to::fn")]`: value used when no field supplies one.
///
/// On a fieldless enum, rows decode by discriminant.
///
/// ```ignore
/// #[derive(Mappable)]
/// struct User {
///     id: i64,
///     #[rowmap(rename = "display_name")]
///     name: Option<String>,
/// }
/// ```
#[proc_macro_derive(Mappable, attributes(rowmap))]
pub fn derive_mappable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match mappable_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Derive `rowmap::ToParams`: one parameter per field, in declaration order.
///
/// `#[rowmap(skip_insert)]` leaves a field out; `rename` applies.
#[proc_macro_derive(ToParams, attributes(rowmap))]
pub fn derive_to_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match to_params_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    default: Option<Path>,
    skip_insert: bool,
}

impl FieldAttrs {
    fn parse(field: &Field) -> Result<Self, syn::Error> {
        let mut attrs = Self::default();
        for attr in rowmap_attrs(&field.attrs) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.rename = Some(value.value());
                } else if meta.path.is_ident("default") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.default = Some(value.parse()?);
                } else if meta.path.is_ident("skip_insert") {
                    attrs.skip_insert = true;
                } else {
                    return Err(meta.error("unknown rowmap field attribute"));
                }
                Ok(())
            })?;
        }
        Ok(attrs)
    }
}

/// `#[rowmap(default)]` on the container.
fn container_uses_default(input: &DeriveInput) -> Result<bool, syn::Error> {
    let mut use_default = false;
    for attr in rowmap_attrs(&input.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                use_default = true;
                Ok(())
            } else {
                Err(meta.error("unknown rowmap container attribute"))
            }
        })?;
    }
    Ok(use_default)
}

fn rowmap_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("rowmap"))
}

fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> Result<Vec<(&'a Field, FieldAttrs)>, syn::Error> {
    let name = &input.ident;
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .map(|f| FieldAttrs::parse(f).map(|attrs| (f, attrs)))
                .collect(),
            _ => Err(syn::Error::new_spanned(
                name,
                format!("{derive} only supports structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            name,
            format!("{derive} only supports structs"),
        )),
    }
}

/// Generics of the derived impl, with `bound` added to every type parameter.
///
/// `Mappable` values are `'static`, so lifetime parameters are rejected there.
fn bounded_generics(
    input: &DeriveInput,
    bound: TokenStream2,
    allow_lifetimes: bool,
) -> Result<Generics, syn::Error> {
    let mut generics = input.generics.clone();
    if !allow_lifetimes {
        if let Some(lifetime) = generics.lifetimes().next() {
            return Err(syn::Error::new_spanned(
                lifetime,
                "Mappable does not support lifetime parameters",
            ));
        }
    }
    let bound: TypeParamBound = syn::parse2(bound)?;
    for param in generics.type_params_mut() {
        param.bounds.push(bound.clone());
    }
    Ok(generics)
}

/// Column name of a field: the rename, or the identifier without `r#`.
fn column_name(field: &Field, attrs: &FieldAttrs) -> Result<String, syn::Error> {
    if let Some(rename) = &attrs.rename {
        return Ok(rename.clone());
    }
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
    let name = ident.to_string();
    Ok(name.strip_prefix("r#").unwrap_or(&name).to_string())
}

fn mappable_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    if let Data::Enum(data) = &input.data {
        return enum_impl(input, data);
    }

    let name = &input.ident;
    let generics = bounded_generics(input, quote! { ::rowmap::Mappable }, false)?;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let fields = named_fields(input, "Mappable")?;
    let use_default = container_uses_default(input)?;

    let mut properties = Vec::new();
    let mut params = Vec::new();
    let mut inits = Vec::new();

    for (slot, (field, attrs)) in fields.iter().enumerate() {
        let ident = &field.ident;
        let ty = &field.ty;
        let column = column_name(field, attrs)?;

        properties.push(quote! {
            .property::<#ty>(#column, |this: &mut Self, value: #ty| {
                this.#ident = value;
            })
        });
        params.push(match &attrs.default {
            Some(path) => quote! { ::rowmap::CtorParam::with_default::<#ty>(#column, #path) },
            None => quote! { ::rowmap::CtorParam::of::<#ty>(#column) },
        });
        inits.push(quote! { #ident: args.take::<#ty>(#slot)? });
    }

    let construct = if use_default {
        quote! { .factory(<Self as ::std::default::Default>::default) }
    } else {
        quote! {
            .constructor(
                ::std::vec![#(#params),*],
                |args: &mut ::rowmap::Args| {
                    ::std::result::Result::Ok(Self { #(#inits),* })
                },
            )
        }
    };

    Ok(quote! {
        impl #impl_generics ::rowmap::Mappable for #name #ty_generics #where_clause {
            fn shape() -> ::rowmap::Shape<Self> {
                ::rowmap::Shape::Composite(
                    ::rowmap::CompositeShape::new()
                        #(#properties)*
                        #construct
                )
            }
        }
    })
}

fn enum_impl(input: &DeriveInput, data: &syn::DataEnum) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let generics = bounded_generics(input, quote! { ::rowmap::Mappable }, false)?;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut arms = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Mappable only supports enums without fields",
            ));
        }
        let ident = &variant.ident;
        arms.push(quote! {
            n if n == Self::#ident as i64 => ::std::option::Option::Some(Self::#ident),
        });
    }

    Ok(quote! {
        impl #impl_generics ::rowmap::Mappable for #name #ty_generics #where_clause {
            fn shape() -> ::rowmap::Shape<Self> {
                ::rowmap::Shape::Enum(|discriminant: i64| match discriminant {
                    #(#arms)*
                    _ => ::std::option::Option::None,
                })
            }
        }
    })
}

fn to_params_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let generics = bounded_generics(input, quote! { ::rowmap::ToValue }, true)?;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let fields = named_fields(input, "ToParams")?;

    let mut params = Vec::new();
    for (field, attrs) in &fields {
        if attrs.skip_insert {
            continue;
        }
        let ident = &field.ident;
        let column = column_name(field, attrs)?;
        params.push(quote! { ::rowmap::Parameter::new(#column, &self.#ident) });
    }
    let count = params.len();

    Ok(quote! {
        impl #impl_generics ::rowmap::ToParams for #name #ty_generics #where_clause {
            fn to_params(&self) -> ::std::vec::Vec<::rowmap::Parameter> {
                ::std::vec![#(#params),*]
            }

            fn param_count(&self) -> usize {
                #count
            }
        }
    })
}
