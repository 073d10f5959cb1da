use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use syn::meta::ParseNestedMeta;
use syn::parse::Parse as _;
use syn::spanned::Spanned as _;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, FnArg, GenericArgument, ImplItem, ItemImpl,
    LitStr, Pat, PathArguments, ReturnType, Token, Type,
};

const COMPONENT_ATTR: &str = "component";
const INJECT_ATTR: &str = "inject";
const CONSTRUCTOR_ATTR: &str = "constructor";

/// Returns `C` for a type written as `Wrapper<C>`.
fn extract_wrapped_type(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == wrapper
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

enum DependencyKind {
    Required(Type),
    Optional(Type),
}

fn dependency_kind(ty: &Type) -> Option<DependencyKind> {
    if let Some(inner) = extract_wrapped_type(ty, "Arc") {
        return Some(DependencyKind::Required(inner));
    }
    extract_wrapped_type(ty, "Option")
        .and_then(|v| extract_wrapped_type(&v, "Arc"))
        .map(DependencyKind::Optional)
}

/// Registration options shared by `#[component(...)]` and `#[injectable(...)]`.
#[derive(Default)]
struct ComponentOptions {
    scope: Option<TokenStream2>,
    primary: bool,
    provides: Vec<Type>,
    stereotype: Option<TokenStream2>,
}

impl ComponentOptions {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("scope") {
            let value: LitStr = meta.value()?.parse()?;
            self.scope = Some(match value.value().as_str() {
                "singleton" => quote! { ::trellis::Scope::Singleton },
                "prototype" => quote! { ::trellis::Scope::Prototype },
                _ => {
                    return Err(Error::new(
                        value.span(),
                        "scope must be \"singleton\" or \"prototype\"",
                    ));
                }
            });
            Ok(())
        } else if meta.path.is_ident("primary") {
            self.primary = true;
            Ok(())
        } else if meta.path.is_ident("provides") {
            let content;
            syn::parenthesized!(content in meta.input);
            self.provides
                .extend(content.parse_terminated(Type::parse, Token![,])?);
            Ok(())
        } else if meta.path.is_ident("stereotype") {
            let value: LitStr = meta.value()?.parse()?;
            self.stereotype = Some(match value.value().as_str() {
                "component" => quote! { ::trellis::Stereotype::Component },
                "service" => quote! { ::trellis::Stereotype::Service },
                "repository" => quote! { ::trellis::Stereotype::Repository },
                "controller" => quote! { ::trellis::Stereotype::Controller },
                _ => {
                    return Err(Error::new(
                        value.span(),
                        "stereotype must be one of \"component\", \"service\", \"repository\" or \"controller\"",
                    ));
                }
            });
            Ok(())
        } else {
            Err(meta.error("unsupported component option"))
        }
    }

    fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs {
            if attr.path().is_ident(COMPONENT_ATTR) {
                attr.parse_nested_meta(|meta| options.parse(meta))?;
            }
        }
        Ok(options)
    }

    /// Builder calls applied before the dependencies.
    fn builder_calls(&self) -> TokenStream2 {
        let provides = self.provides.iter().map(|ty| {
            quote! {
                .provides(|c: ::std::sync::Arc<Self>| c as ::std::sync::Arc<#ty>)
            }
        });
        let scope = self.scope.as_ref().map(|v| quote! { .scope(#v) });
        let stereotype = self.stereotype.as_ref().map(|v| quote! { .stereotype(#v) });
        let primary = self.primary.then(|| quote! { .primary(true) });
        quote! {
            #(#provides)*
            #scope
            #primary
            #stereotype
        }
    }
}

#[derive(Default)]
struct InjectOptions {
    field: bool,
    optional: bool,
    default: bool,
}

impl InjectOptions {
    fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs {
            if !attr.path().is_ident(INJECT_ATTR) {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("field") {
                    options.field = true;
                } else if meta.path.is_ident("optional") {
                    options.optional = true;
                } else if meta.path.is_ident("default") {
                    options.default = true;
                } else {
                    return Err(meta.error("expected `field`, `optional` or `default`"));
                }
                Ok(())
            })?;
            if options.default && options.field {
                return Err(Error::new(
                    attr.span(),
                    "`default` cannot be combined with `field`",
                ));
            }
            if options.optional && !options.field {
                return Err(Error::new(
                    attr.span(),
                    "`optional` applies to field injection, use Option<Arc<T>> for constructor dependencies",
                ));
            }
        }
        Ok(options)
    }
}

/// Derives `trellis::Component` for a struct.
///
/// `Arc<T>` fields are required constructor dependencies and `Option<Arc<T>>`
/// fields are optional ones. `#[inject(field)]` marks an `Autowired<T>` field
/// that is wired after construction, `#[inject(default)]` fills a field from
/// `Default`. Registration options go into `#[component(...)]`.
#[proc_macro_derive(Component, attributes(component, inject))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    handle_derive_component(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Implements `trellis::Component` for the type of an impl block.
///
/// The function marked `#[constructor]` is the constructor. Its parameters are
/// the dependencies, named after the parameters.
#[proc_macro_attribute]
pub fn injectable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut options = ComponentOptions::default();
    let parser = syn::meta::parser(|meta| options.parse(meta));
    syn::parse_macro_input!(attr with parser);
    let item_impl = match syn::parse::<ItemImpl>(item) {
        Ok(v) => v,
        Err(_) => {
            return Error::new(
                proc_macro2::Span::call_site(),
                "#[injectable] can only be applied to impl blocks",
            )
            .into_compile_error()
            .into();
        }
    };
    handle_injectable_impl(item_impl, options)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn handle_derive_component(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => return Err(Error::new(name.span(), "Only structs are supported")),
    };
    let options = ComponentOptions::from_attrs(&input.attrs)?;

    let mut dependency_calls = Vec::new();
    let mut field_inits = Vec::new();

    let construct = match fields {
        Fields::Named(fields) => {
            for field in &fields.named {
                let Some(field_ident) = field.ident.as_ref() else {
                    continue;
                };
                let field_name = field_ident.to_string();
                let field_ty = &field.ty;
                let inject = InjectOptions::from_attrs(&field.attrs)?;

                if inject.default {
                    field_inits.push(quote! {
                        #field_ident: ::core::default::Default::default()
                    });
                } else if inject.field {
                    let inner = extract_wrapped_type(field_ty, "Autowired").ok_or_else(|| {
                        Error::new(
                            field_ty.span(),
                            format!("#[{INJECT_ATTR}(field)] requires a field of type Autowired<T>"),
                        )
                    })?;
                    let method = if inject.optional {
                        quote! { optional_field }
                    } else {
                        quote! { field }
                    };
                    dependency_calls.push(quote! {
                        .#method::<#inner, _>(#field_name, |this: &Self, value| {
                            this.#field_ident.wire(value);
                        })
                    });
                    field_inits.push(quote! {
                        #field_ident: ::trellis::Autowired::new()
                    });
                } else {
                    match dependency_kind(field_ty) {
                        Some(DependencyKind::Required(inner)) => {
                            dependency_calls.push(quote! {
                                .depends_on::<#inner>(#field_name)
                            });
                            field_inits.push(quote! {
                                #field_ident: args.required::<#inner>(#field_name)?
                            });
                        }
                        Some(DependencyKind::Optional(inner)) => {
                            dependency_calls.push(quote! {
                                .optional::<#inner>(#field_name)
                            });
                            field_inits.push(quote! {
                                #field_ident: args.optional::<#inner>(#field_name)?
                            });
                        }
                        None => {
                            return Err(Error::new(
                                field_ty.span(),
                                format!(
                                    "Component dependencies must be of type Arc<T> or Option<Arc<T>>, or use #[{INJECT_ATTR}(...)]"
                                ),
                            ));
                        }
                    }
                }
            }
            quote! { Self { #(#field_inits,)* } }
        }
        Fields::Unnamed(_) => {
            return Err(Error::new(name.span(), "Tuple structs are not supported"));
        }
        Fields::Unit => quote! { Self },
    };

    let builder_calls = options.builder_calls();

    Ok(quote! {
        impl #impl_generics ::trellis::Component for #name #ty_generics #where_clause {
            fn descriptor() -> ::core::result::Result<::trellis::ComponentDescriptor, ::trellis::ContainerError> {
                ::trellis::ComponentDescriptor::builder::<Self>()
                    #builder_calls
                    #(#dependency_calls)*
                    .construct(|args| {
                        let _ = &args;
                        ::core::result::Result::Ok(#construct)
                    })
                    .build()
            }
        }
    })
}

fn handle_injectable_impl(input: ItemImpl, options: ComponentOptions) -> syn::Result<TokenStream2> {
    if input.trait_.is_some() {
        return Err(Error::new(input.span(), "Trait impls are not supported"));
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let mut constructor = None;

    for item in &input.items {
        if let ImplItem::Fn(method) = item {
            for attr in &method.attrs {
                if attr.path().is_ident(CONSTRUCTOR_ATTR) {
                    if constructor.is_some() {
                        return Err(Error::new(attr.span(), "Only one constructor method allowed"));
                    }
                    constructor = Some(method);
                }
            }
        }
    }

    let method = constructor
        .ok_or_else(|| Error::new(input.span(), "No #[constructor] method found"))?;
    if method.sig.asyncness.is_some() {
        return Err(Error::new(
            method.sig.span(),
            "Constructor method cannot be async",
        ));
    }

    let method_name = &method.sig.ident;
    let is_result = match &method.sig.output {
        ReturnType::Default => {
            return Err(Error::new(
                method.sig.span(),
                "Constructor method must return Self or Result<Self, E>",
            ));
        }
        ReturnType::Type(_, ty) => extract_wrapped_type(ty, "Result").is_some(),
    };

    let mut dependency_calls = Vec::new();
    let mut arg_inits = Vec::new();
    let mut arg_names = Vec::new();

    for fn_arg in &method.sig.inputs {
        let pat_type = match fn_arg {
            FnArg::Receiver(_) => {
                return Err(Error::new(
                    fn_arg.span(),
                    "Constructor method cannot have self parameter",
                ));
            }
            FnArg::Typed(v) => v,
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(Error::new(pat_type.pat.span(), "Only simple bindings supported"));
        };
        let arg_name = &pat_ident.ident;
        let dependency_name = arg_name.to_string();
        arg_names.push(quote! { #arg_name });

        match dependency_kind(&pat_type.ty) {
            Some(DependencyKind::Required(inner)) => {
                dependency_calls.push(quote! { .depends_on::<#inner>(#dependency_name) });
                arg_inits.push(quote! {
                    let #arg_name = args.required::<#inner>(#dependency_name)?;
                });
            }
            Some(DependencyKind::Optional(inner)) => {
                dependency_calls.push(quote! { .optional::<#inner>(#dependency_name) });
                arg_inits.push(quote! {
                    let #arg_name = args.optional::<#inner>(#dependency_name)?;
                });
            }
            None => {
                return Err(Error::new(
                    pat_type.ty.span(),
                    "Arguments must be of type Arc<T> or Option<Arc<T>>",
                ));
            }
        }
    }

    let mut cleaned_input = input.clone();
    for item in &mut cleaned_input.items {
        if let ImplItem::Fn(method) = item {
            method
                .attrs
                .retain(|attr| !attr.path().is_ident(CONSTRUCTOR_ATTR));
        }
    }

    let method_call = quote! { Self::#method_name(#(#arg_names),*) };
    let construct_body = if is_result {
        quote! {
            #(#arg_inits)*
            #method_call.map_err(::core::convert::Into::<::trellis::BoxError>::into)
        }
    } else {
        quote! {
            #(#arg_inits)*
            ::core::result::Result::Ok(#method_call)
        }
    };

    let builder_calls = options.builder_calls();

    Ok(quote! {
        #cleaned_input

        impl #impl_generics ::trellis::Component for #self_ty #where_clause {
            fn descriptor() -> ::core::result::Result<::trellis::ComponentDescriptor, ::trellis::ContainerError> {
                ::trellis::ComponentDescriptor::builder::<Self>()
                    #builder_calls
                    #(#dependency_calls)*
                    .construct(|args| {
                        let _ = &args;
                        #construct_body
                    })
                    .build()
            }
        }
    })
}
